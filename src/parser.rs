use std::collections::{hash_map, HashMap};

use pest::Parser as _;
use pest_derive::Parser;
use tracing::debug;

use crate::ast::{
    AttrRef, AttributeKind, Clause, ClauseKind, ClauseParam, DesignEntity, DesignEntityKind,
    PatternClause, Query, Relationship, SelectedEntity, SuchThatClause, Synonym, WithClause,
    WithRef,
};
use crate::compiler;
use crate::error::{PqlError, Result};
use crate::scan::{self, Cursor};

#[derive(Parser)]
#[grammar = "pql.pest"]
pub struct PqlParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;
type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

/// Parses one complete query: declarations, the selection, then any number
/// of `such that`, `pattern` and `with` clauses.
pub fn parse(code: &str) -> Result<Query> {
    ParseContext::default().parse_query(code)
}

/// State that lives for exactly one call to [`parse`].
#[derive(Debug, Default)]
struct ParseContext {
    synonyms: HashMap<Synonym, DesignEntityKind>,
    /// The first synonym declared twice. Reported when the selection is
    /// parsed, so that `Select BOOLEAN` can turn it into a boolean error.
    conflict: Option<Synonym>,
    boolean_select: bool,
}

impl ParseContext {
    fn parse_query(mut self, code: &str) -> Result<Query> {
        let mut cursor = Cursor::new(code);

        self.parse_declarations(&mut cursor)?;
        let mut query = Query::new(self.parse_selection(&mut cursor)?);

        self.parse_clauses(&mut cursor, &mut query).map_err(|err| {
            if self.boolean_select {
                err.into_boolean()
            } else {
                err
            }
        })?;

        Ok(query)
    }

    fn parse_declarations(&mut self, cursor: &mut Cursor<'_>) -> Result<()> {
        while cursor.starts_with(Rule::declaration_head) {
            let mut pairs = cursor.take(Rule::declaration)?.into_inner();
            let keyword = expect_next_rule(&mut pairs, Rule::design_entity);
            let kind = DesignEntityKind::from_keyword(keyword.as_str()).ok_or_else(|| {
                PqlError::syntax(format!("unknown design entity {:?}", keyword.as_str()))
            })?;

            for synonym in pairs {
                self.declare(synonym.as_str(), kind);
            }
        }

        debug!(declared = self.synonyms.len(), conflict = ?self.conflict, "parsed declarations");
        Ok(())
    }

    fn declare(&mut self, synonym: &str, kind: DesignEntityKind) {
        if self.conflict.is_some() {
            return;
        }

        match self.synonyms.entry(synonym.to_owned()) {
            hash_map::Entry::Vacant(vacant) => {
                vacant.insert(kind);
            }
            hash_map::Entry::Occupied(_) => {
                self.conflict = Some(synonym.to_owned());
            }
        }
    }

    fn conflict_message(synonym: &str) -> String {
        format!("synonym '{}' is declared more than once", synonym)
    }

    fn parse_selection(&mut self, cursor: &mut Cursor<'_>) -> Result<Vec<SelectedEntity>> {
        let mut pairs = cursor.take(Rule::select_clause)?.into_inner();
        expect_next_rule(&mut pairs, Rule::select_keyword);
        let target = expect_next_rule(&mut pairs, Rule::select_target);
        let payload = expect_next_rule_any(&mut target.into_inner());

        if payload.as_rule() == Rule::boolean {
            self.boolean_select = true;
            if let Some(synonym) = &self.conflict {
                return Err(PqlError::BooleanSemantic(Self::conflict_message(synonym)));
            }
            debug!("selecting BOOLEAN");
            return Ok(vec![SelectedEntity::Boolean]);
        }

        if let Some(synonym) = &self.conflict {
            return Err(PqlError::semantic(Self::conflict_message(synonym)));
        }

        let selection = match payload.as_rule() {
            Rule::attr_ref => vec![self.parse_selected_attr(payload)?],
            Rule::tuple => self.parse_tuple(payload)?,
            Rule::synonym => vec![SelectedEntity::Entity(self.resolve(payload.as_str())?)],
            rule => unreachable!("unexpected select target {:?}", rule),
        };

        debug!(selected = selection.len(), "parsed selection");
        Ok(selection)
    }

    fn parse_tuple(&self, tuple: Pair<'_>) -> Result<Vec<SelectedEntity>> {
        let body = expect_next_rule(&mut tuple.into_inner(), Rule::tuple_body);
        let elements = scan::split_delimited(body.as_str(), ',');
        if elements.is_empty() {
            return Err(PqlError::syntax("tuple selection must not be empty"));
        }

        elements
            .into_iter()
            .map(|element| {
                let mut pairs = PqlParser::parse(Rule::tuple_element, element)?;
                let element = expect_next_rule(&mut pairs, Rule::tuple_element);
                let reference = expect_next_rule_any(&mut element.into_inner());
                match reference.as_rule() {
                    Rule::attr_ref => self.parse_selected_attr(reference),
                    Rule::synonym => Ok(SelectedEntity::Entity(self.resolve(reference.as_str())?)),
                    rule => unreachable!("unexpected tuple element {:?}", rule),
                }
            })
            .collect()
    }

    fn parse_selected_attr(&self, pair: Pair<'_>) -> Result<SelectedEntity> {
        let (entity, attribute) = self.parse_attr_ref(pair)?;
        Ok(SelectedEntity::Attribute(AttrRef::new(entity, attribute)?))
    }

    fn parse_attr_ref(&self, pair: Pair<'_>) -> Result<(DesignEntity, AttributeKind)> {
        let mut pairs = pair.into_inner();
        let synonym = expect_next_rule(&mut pairs, Rule::synonym);
        let attr_name = expect_next_rule(&mut pairs, Rule::attr_name);

        let entity = self.resolve(synonym.as_str())?;
        let attribute = AttributeKind::from_keyword(attr_name.as_str()).ok_or_else(|| {
            PqlError::syntax(format!("unknown attribute {:?}", attr_name.as_str()))
        })?;
        Ok((entity, attribute))
    }

    fn resolve(&self, synonym: &str) -> Result<DesignEntity> {
        match self.synonyms.get(synonym) {
            Some(kind) => DesignEntity::new(*kind, synonym),
            None => Err(PqlError::semantic(format!(
                "synonym '{}' is used but not declared",
                synonym
            ))),
        }
    }

    fn parse_clauses(&self, cursor: &mut Cursor<'_>, query: &mut Query) -> Result<()> {
        let mut previous: Option<ClauseKind> = None;

        while !cursor.is_empty() {
            let kind = if cursor.starts_with(Rule::and_keyword) {
                cursor.take(Rule::and_keyword)?;
                previous.ok_or_else(|| PqlError::syntax("'and' must follow another clause"))?
            } else if cursor.starts_with(Rule::such_that_keyword) {
                cursor.take(Rule::such_that_keyword)?;
                ClauseKind::SuchThat
            } else if cursor.starts_with(Rule::pattern_keyword) {
                cursor.take(Rule::pattern_keyword)?;
                ClauseKind::Pattern
            } else if cursor.starts_with(Rule::with_keyword) {
                cursor.take(Rule::with_keyword)?;
                ClauseKind::With
            } else {
                return Err(PqlError::syntax(format!(
                    "expected a clause but found {:?}",
                    cursor.rest()
                )));
            };

            let clause = match kind {
                ClauseKind::SuchThat => {
                    self.check_such_that_synonyms(cursor.rest())?;
                    self.parse_such_that(cursor.take(Rule::such_that_body)?)?
                }
                ClauseKind::Pattern => self.parse_pattern(cursor.take(Rule::pattern_body)?)?,
                ClauseKind::With => self.parse_with(cursor.take(Rule::with_body)?)?,
            };

            debug!(%clause, "parsed clause");
            query.add_clause(clause);
            previous = Some(kind);
        }

        Ok(())
    }

    fn parse_such_that(&self, body: Pair<'_>) -> Result<Clause> {
        let mut pairs = body.into_inner();
        let relation = parse_relation(expect_next_rule(&mut pairs, Rule::relation))?;
        let lhs = self.parse_param(expect_next_rule(&mut pairs, Rule::clause_param))?;
        let rhs = self.parse_param(expect_next_rule(&mut pairs, Rule::clause_param))?;

        Ok(Clause::SuchThat(SuchThatClause { relation, lhs, rhs }))
    }

    /// Resolves every bare synonym in the parameters of a `such that` body
    /// before the parameters are parsed, so an undeclared synonym is reported
    /// even when the other parameter is malformed. Quoted text is ignored. A
    /// body without the relation-and-parentheses shape is left to the grammar.
    fn check_such_that_synonyms(&self, body: &str) -> Result<()> {
        let mut pairs = match PqlParser::parse(Rule::such_that_shape, body) {
            Ok(mut pairs) => expect_next_rule(&mut pairs, Rule::such_that_shape).into_inner(),
            Err(_) => return Ok(()),
        };
        parse_relation(expect_next_rule(&mut pairs, Rule::relation))?;

        for text in pairs {
            let masked = scan::mask_quoted(text.as_str());
            for word in scan::find_words(Rule::synonym, &masked) {
                self.resolve(word.as_str())?;
            }
        }
        Ok(())
    }

    /// Handles `clause_param` and `pattern_lhs`, which share their
    /// alternatives.
    fn parse_param(&self, pair: Pair<'_>) -> Result<ClauseParam> {
        let inner = expect_next_rule_any(&mut pair.into_inner());
        Ok(match inner.as_rule() {
            Rule::wildcard => ClauseParam::Wildcard,
            Rule::quoted_name => ClauseParam::Name(quoted_name(inner)),
            Rule::integer => ClauseParam::Index(parse_index(inner)?),
            Rule::synonym => ClauseParam::Entity(self.resolve(inner.as_str())?),
            rule => unreachable!("unexpected clause parameter {:?}", rule),
        })
    }

    fn parse_pattern(&self, body: Pair<'_>) -> Result<Clause> {
        let mut pairs = body.into_inner();
        let synonym = expect_next_rule(&mut pairs, Rule::synonym);
        let lhs = expect_next_rule(&mut pairs, Rule::pattern_lhs);
        let specs = pairs.collect::<Vec<_>>();

        let entity = self.resolve(synonym.as_str())?;
        let arity = match entity.kind() {
            DesignEntityKind::If => 2,
            DesignEntityKind::Assign | DesignEntityKind::While => 1,
            _ => {
                return Err(PqlError::semantic(format!(
                    "'{}' cannot be used in a pattern clause",
                    entity.synonym()
                )))
            }
        };

        let lhs = self.parse_param(lhs)?;
        if let Some(variable) = lhs.entity() {
            if variable.kind() != DesignEntityKind::Variable {
                return Err(PqlError::semantic(format!(
                    "pattern argument '{}' is not a variable",
                    variable.synonym()
                )));
            }
        }

        if specs.len() != arity {
            return Err(PqlError::semantic(format!(
                "pattern '{}' takes {} arguments",
                entity.synonym(),
                arity + 1
            )));
        }

        let rhs = if entity.kind() == DesignEntityKind::Assign {
            match specs.into_iter().next() {
                Some(spec) => parse_pattern_spec(spec)?,
                None => unreachable!("arity checked above"),
            }
        } else {
            if let Some(spec) = specs.iter().find(|spec| !is_wildcard_spec(spec)) {
                return Err(PqlError::semantic(format!(
                    "pattern '{}' only accepts '_' but got {:?}",
                    entity.synonym(),
                    spec.as_str()
                )));
            }
            ClauseParam::Wildcard
        };

        Ok(Clause::Pattern(PatternClause::new(entity, lhs, rhs)?))
    }

    fn parse_with(&self, body: Pair<'_>) -> Result<Clause> {
        let mut pairs = body.into_inner();
        let lhs = self.parse_with_ref(expect_next_rule(&mut pairs, Rule::with_ref))?;
        let rhs = self.parse_with_ref(expect_next_rule(&mut pairs, Rule::with_ref))?;

        Ok(Clause::With(WithClause::new(lhs, rhs)?))
    }

    fn parse_with_ref(&self, pair: Pair<'_>) -> Result<WithRef> {
        let inner = expect_next_rule_any(&mut pair.into_inner());
        match inner.as_rule() {
            Rule::integer => WithRef::new(
                ClauseParam::Index(parse_index(inner)?),
                AttributeKind::Integer,
            ),
            Rule::quoted_name => {
                WithRef::new(ClauseParam::Name(quoted_name(inner)), AttributeKind::Name)
            }
            Rule::attr_ref => {
                let (entity, attribute) = self.parse_attr_ref(inner)?;
                WithRef::new(ClauseParam::Entity(entity), attribute)
            }
            Rule::synonym => WithRef::new(
                ClauseParam::Entity(self.resolve(inner.as_str())?),
                AttributeKind::None,
            ),
            rule => unreachable!("unexpected with reference {:?}", rule),
        }
    }
}

fn parse_relation(pair: Pair<'_>) -> Result<Relationship> {
    let mut pairs = pair.into_inner();
    let name = expect_next_rule(&mut pairs, Rule::relation_name);
    let transitive = pairs.next().is_some();

    Relationship::from_keyword(name.as_str(), transitive).ok_or_else(|| {
        PqlError::syntax(format!("{} has no transitive form", name.as_str()))
    })
}

fn parse_pattern_spec(spec: Pair<'_>) -> Result<ClauseParam> {
    let inner = expect_next_rule_any(&mut spec.into_inner());
    let is_wildcard = match inner.as_rule() {
        Rule::wildcard => return Ok(ClauseParam::Wildcard),
        Rule::partial_expression => true,
        Rule::exact_expression => false,
        rule => unreachable!("unexpected pattern argument {:?}", rule),
    };

    let quoted = expect_next_rule(&mut inner.into_inner(), Rule::quoted_expression);
    let text = expect_next_rule(&mut quoted.into_inner(), Rule::expression_text);
    let tokens = compiler::compile(text.as_str())?;

    Ok(ClauseParam::Expression {
        tokens,
        is_wildcard,
    })
}

fn is_wildcard_spec(spec: &Pair<'_>) -> bool {
    spec.clone()
        .into_inner()
        .next()
        .map_or(false, |inner| inner.as_rule() == Rule::wildcard)
}

fn quoted_name(pair: Pair<'_>) -> String {
    expect_next_rule(&mut pair.into_inner(), Rule::ident)
        .as_str()
        .to_owned()
}

fn parse_index(pair: Pair<'_>) -> Result<u32> {
    pair.as_str()
        .parse()
        .map_err(|_| PqlError::syntax(format!("integer {} is out of range", pair.as_str())))
}

fn expect_next_rule<'a>(pairs: &mut Pairs<'a>, rule: Rule) -> Pair<'a> {
    let pair = expect_next_rule_any(pairs);
    debug_assert_eq!(pair.as_rule(), rule);
    pair
}

fn expect_next_rule_any<'a>(pairs: &mut Pairs<'a>) -> Pair<'a> {
    match pairs.next() {
        Some(pair) => pair,
        None => unreachable!("grammar guarantees another pair"),
    }
}
