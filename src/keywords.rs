//! Surface keywords of the query language and the enums they stand for.

use crate::ast::{AttributeKind, ClauseKind, DesignEntityKind, Relationship};

pub const DESIGN_ENTITY_KEYWORDS: &[(&str, DesignEntityKind)] = &[
    ("stmt", DesignEntityKind::Statement),
    ("read", DesignEntityKind::Read),
    ("print", DesignEntityKind::Print),
    ("call", DesignEntityKind::Call),
    ("while", DesignEntityKind::While),
    ("if", DesignEntityKind::If),
    ("assign", DesignEntityKind::Assign),
    ("variable", DesignEntityKind::Variable),
    ("constant", DesignEntityKind::Constant),
    ("procedure", DesignEntityKind::Procedure),
    ("prog_line", DesignEntityKind::ProgLine),
];

pub const ATTRIBUTE_KEYWORDS: &[(&str, AttributeKind)] = &[
    ("procName", AttributeKind::ProcName),
    ("varName", AttributeKind::VarName),
    ("value", AttributeKind::Value),
    ("stmt#", AttributeKind::StmtNo),
    ("name", AttributeKind::Name),
    ("value#", AttributeKind::Value),
];

/// Relationship name, its plain form and its `*` form if it has one.
pub const RELATIONSHIP_KEYWORDS: &[(&str, Relationship, Option<Relationship>)] = &[
    ("Follows", Relationship::Follows, Some(Relationship::FollowsT)),
    ("Parent", Relationship::Parent, Some(Relationship::ParentT)),
    ("Modifies", Relationship::Modifies, None),
    ("Uses", Relationship::Uses, None),
    ("Calls", Relationship::Calls, Some(Relationship::CallsT)),
    ("Next", Relationship::Next, Some(Relationship::NextT)),
    ("Affects", Relationship::Affects, Some(Relationship::AffectsT)),
    ("NextBip", Relationship::NextBip, Some(Relationship::NextBipT)),
    ("AffectsBip", Relationship::AffectsBip, Some(Relationship::AffectsBipT)),
];

pub const CLAUSE_KEYWORDS: &[(ClauseKind, &str)] = &[
    (ClauseKind::SuchThat, "such that"),
    (ClauseKind::Pattern, "pattern"),
    (ClauseKind::With, "with"),
];

impl DesignEntityKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        DESIGN_ENTITY_KEYWORDS
            .iter()
            .find(|(word, _)| *word == keyword)
            .map(|(_, kind)| *kind)
    }

    pub fn keyword(self) -> &'static str {
        DESIGN_ENTITY_KEYWORDS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map_or("_", |(word, _)| *word)
    }
}

impl AttributeKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        ATTRIBUTE_KEYWORDS
            .iter()
            .find(|(word, _)| *word == keyword)
            .map(|(_, kind)| *kind)
    }

    /// Integer literals and bare synonyms have no keyword. `Value` renders as
    /// `value` even though `value#` is accepted too.
    pub fn keyword(self) -> Option<&'static str> {
        ATTRIBUTE_KEYWORDS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(word, _)| *word)
    }
}

impl Relationship {
    /// Looks up a relationship by name. `None` when the name is unknown or
    /// has no transitive form but `transitive` was asked for.
    pub fn from_keyword(name: &str, transitive: bool) -> Option<Self> {
        let (_, plain, closure) = RELATIONSHIP_KEYWORDS
            .iter()
            .find(|(word, _, _)| *word == name)?;
        if transitive {
            *closure
        } else {
            Some(*plain)
        }
    }

    pub fn is_transitive(self) -> bool {
        RELATIONSHIP_KEYWORDS
            .iter()
            .any(|(_, _, closure)| *closure == Some(self))
    }

    pub fn keyword(self) -> &'static str {
        use Relationship::*;

        match self {
            Follows => "Follows",
            FollowsT => "Follows*",
            Parent => "Parent",
            ParentT => "Parent*",
            Modifies => "Modifies",
            Uses => "Uses",
            Calls => "Calls",
            CallsT => "Calls*",
            Next => "Next",
            NextT => "Next*",
            Affects => "Affects",
            AffectsT => "Affects*",
            NextBip => "NextBip",
            NextBipT => "NextBip*",
            AffectsBip => "AffectsBip",
            AffectsBipT => "AffectsBip*",
        }
    }

    /// Lower ranks are cheaper to evaluate and are scheduled first when
    /// clauses otherwise tie.
    pub fn selectivity_rank(self) -> u8 {
        use Relationship::*;

        match self {
            Follows => 1,
            Parent => 2,
            Modifies => 3,
            Uses => 4,
            Calls => 5,
            Next => 6,
            FollowsT => 7,
            ParentT => 8,
            CallsT => 9,
            NextT => 10,
            Affects => 11,
            NextBip => 12,
            AffectsT => 13,
            NextBipT => 14,
            AffectsBip => 15,
            AffectsBipT => 16,
        }
    }
}

impl ClauseKind {
    pub fn keyword(self) -> &'static str {
        CLAUSE_KEYWORDS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("", |(_, word)| *word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_entity_keywords() {
        for (word, kind) in DESIGN_ENTITY_KEYWORDS {
            assert_eq!(DesignEntityKind::from_keyword(word), Some(*kind));
            assert_eq!(kind.keyword(), *word);
        }
        assert_eq!(DesignEntityKind::from_keyword("statement"), None);
        assert_eq!(DesignEntityKind::Wildcard.keyword(), "_");
    }

    #[test]
    fn test_attribute_keywords() {
        assert_eq!(AttributeKind::from_keyword("stmt#"), Some(AttributeKind::StmtNo));
        assert_eq!(AttributeKind::from_keyword("stmt"), None);
        assert_eq!(AttributeKind::None.keyword(), None);
        assert_eq!(AttributeKind::ProcName.keyword(), Some("procName"));
        assert_eq!(AttributeKind::from_keyword("name"), Some(AttributeKind::Name));
        assert_eq!(AttributeKind::from_keyword("value#"), Some(AttributeKind::Value));
        assert_eq!(AttributeKind::Value.keyword(), Some("value"));
        assert_eq!(AttributeKind::Integer.keyword(), None);
    }

    #[test]
    fn test_relationship_keywords() {
        assert_eq!(
            Relationship::from_keyword("Follows", true),
            Some(Relationship::FollowsT)
        );
        assert_eq!(
            Relationship::from_keyword("NextBip", false),
            Some(Relationship::NextBip)
        );
        assert_eq!(Relationship::from_keyword("Modifies", true), None);
        assert_eq!(Relationship::from_keyword("Foo", false), None);

        for (word, plain, closure) in RELATIONSHIP_KEYWORDS {
            assert_eq!(plain.keyword(), *word);
            assert!(!plain.is_transitive());
            if let Some(closure) = closure {
                assert_eq!(closure.keyword(), format!("{}*", word));
                assert!(closure.is_transitive());
            }
        }
    }

    #[test]
    fn test_selectivity_ranks_are_distinct() {
        let mut ranks = RELATIONSHIP_KEYWORDS
            .iter()
            .flat_map(|(_, plain, closure)| std::iter::once(*plain).chain(*closure))
            .map(Relationship::selectivity_rank)
            .collect::<Vec<_>>();
        ranks.sort_unstable();
        ranks.dedup();
        assert_eq!(ranks.len(), 16);
    }

    #[test]
    fn test_clause_keywords() {
        assert_eq!(ClauseKind::SuchThat.keyword(), "such that");
        assert_eq!(ClauseKind::With.keyword(), "with");
    }
}
