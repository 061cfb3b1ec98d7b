//! Orders clauses for evaluation. Nothing here evaluates anything; the
//! comparator only tells the evaluator which clause is likely cheapest.

use std::cmp::Ordering;

use crate::ast::{Clause, ClauseKind, ClauseParam, Query};

impl Clause {
    /// Number of parameters the evaluator still has to bind. For patterns the
    /// pattern synonym itself counts; the expression side never binds.
    pub fn free_slots(&self) -> usize {
        match self {
            Clause::SuchThat(clause) => count_free([&clause.lhs, &clause.rhs]),
            Clause::Pattern(clause) => 1 + count_free([clause.lhs()]),
            Clause::With(clause) => count_free([clause.lhs.param(), clause.rhs.param()]),
        }
    }
}

fn count_free<'a>(params: impl IntoIterator<Item = &'a ClauseParam>) -> usize {
    params.into_iter().filter(|param| param.is_free()).count()
}

fn kind_rank(kind: ClauseKind) -> u8 {
    match kind {
        ClauseKind::With => 0,
        ClauseKind::Pattern => 1,
        ClauseKind::SuchThat => 2,
    }
}

/// Fewer free slots first, then `with` before `pattern` before `such that`,
/// then `such that` clauses by relationship selectivity.
pub fn compare_clauses(a: &Clause, b: &Clause) -> Ordering {
    a.free_slots()
        .cmp(&b.free_slots())
        .then_with(|| kind_rank(a.kind()).cmp(&kind_rank(b.kind())))
        .then_with(|| match (a, b) {
            (Clause::SuchThat(a), Clause::SuchThat(b)) => a
                .relation
                .selectivity_rank()
                .cmp(&b.relation.selectivity_rank()),
            _ => Ordering::Equal,
        })
}

impl Query {
    /// The clauses in evaluation order. Equal clauses keep their written order.
    pub fn ranked_clauses(&self) -> Vec<&Clause> {
        let mut ranked = self.clauses().iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| compare_clauses(a, b));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        AttributeKind, DesignEntity, DesignEntityKind, PatternClause, Relationship,
        SuchThatClause, WithClause, WithRef,
    };

    fn entity(kind: DesignEntityKind, synonym: &str) -> ClauseParam {
        ClauseParam::Entity(DesignEntity::new(kind, synonym).unwrap())
    }

    fn such_that(relation: Relationship, lhs: ClauseParam, rhs: ClauseParam) -> Clause {
        Clause::SuchThat(SuchThatClause { relation, lhs, rhs })
    }

    fn bound_with() -> Clause {
        Clause::With(
            WithClause::new(
                WithRef::new(ClauseParam::Index(3), AttributeKind::Integer).unwrap(),
                WithRef::new(ClauseParam::Index(3), AttributeKind::Integer).unwrap(),
            )
            .unwrap(),
        )
    }

    fn one_free_pattern() -> Clause {
        let a = DesignEntity::new(DesignEntityKind::Assign, "a").unwrap();
        Clause::Pattern(
            PatternClause::new(a, ClauseParam::Name("x".into()), ClauseParam::Wildcard).unwrap(),
        )
    }

    #[test]
    fn test_free_slots() {
        let s = entity(DesignEntityKind::Statement, "s");
        assert_eq!(bound_with().free_slots(), 0);
        assert_eq!(one_free_pattern().free_slots(), 1);
        assert_eq!(
            such_that(Relationship::Follows, ClauseParam::Index(1), s.clone()).free_slots(),
            1
        );
        assert_eq!(
            such_that(Relationship::Follows, ClauseParam::Wildcard, s).free_slots(),
            2
        );
    }

    #[test]
    fn test_kind_order_on_ties() {
        let clauses = [
            such_that(
                Relationship::Parent,
                entity(DesignEntityKind::Statement, "s1"),
                entity(DesignEntityKind::Statement, "s2"),
            ),
            one_free_pattern(),
            bound_with(),
        ];
        let mut ranked = clauses.iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| compare_clauses(a, b));
        let kinds = ranked.iter().map(|clause| clause.kind()).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            [ClauseKind::With, ClauseKind::Pattern, ClauseKind::SuchThat]
        );
    }

    #[test]
    fn test_selectivity_breaks_such_that_ties() {
        let s = entity(DesignEntityKind::Statement, "s");
        let affects = such_that(Relationship::AffectsT, ClauseParam::Index(1), s.clone());
        let follows = such_that(Relationship::Follows, ClauseParam::Index(1), s);
        assert_eq!(compare_clauses(&follows, &affects), Ordering::Less);
        assert_eq!(compare_clauses(&affects, &follows), Ordering::Greater);
        assert_eq!(compare_clauses(&follows, &follows), Ordering::Equal);
    }

    #[test]
    fn test_free_slots_dominate_kind() {
        let s = entity(DesignEntityKind::Statement, "s");
        let bound_such_that = such_that(Relationship::Next, ClauseParam::Index(1), ClauseParam::Index(2));
        let free_with = Clause::With(
            WithClause::new(
                WithRef::new(s, AttributeKind::StmtNo).unwrap(),
                WithRef::new(ClauseParam::Index(2), AttributeKind::Integer).unwrap(),
            )
            .unwrap(),
        );
        assert_eq!(compare_clauses(&bound_such_that, &free_with), Ordering::Less);
    }
}
