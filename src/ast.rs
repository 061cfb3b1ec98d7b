use std::fmt;

use itertools::Itertools;

use crate::compiler::{self, Token};
use crate::error::{PqlError, Result};

pub type Synonym = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DesignEntityKind {
    Statement,
    Read,
    Print,
    Call,
    While,
    If,
    Assign,
    Variable,
    Constant,
    Procedure,
    ProgLine,
    /// Placeholder kind for an evaluator that binds a `_` slot to an entity.
    /// It cannot be declared, so the parser never produces it, and
    /// [`Query::declarations`] skips it.
    Wildcard,
}

impl DesignEntityKind {
    /// Whether `attribute` can be read off an entity of this kind.
    pub fn supports(self, attribute: AttributeKind) -> bool {
        use DesignEntityKind::*;

        match attribute {
            AttributeKind::ProcName => matches!(self, Procedure | Call),
            AttributeKind::VarName => matches!(self, Variable | Read | Print),
            AttributeKind::Value => matches!(self, Constant),
            AttributeKind::StmtNo => {
                matches!(self, Statement | Read | Print | Call | While | If | Assign)
            }
            AttributeKind::Name => matches!(self, Procedure | Variable | Call | Read | Print),
            AttributeKind::Integer | AttributeKind::None => false,
        }
    }

    pub fn is_pattern_target(self) -> bool {
        matches!(
            self,
            DesignEntityKind::Assign | DesignEntityKind::While | DesignEntityKind::If
        )
    }
}

/// The type of one side of a `with` comparison. `Integer` is the kind of an
/// integer literal and `None` marks a bare synonym. `Name` is both the kind of
/// a quoted literal and the generic `.name` attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Name,
    VarName,
    ProcName,
    Value,
    StmtNo,
    Integer,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Name,
    Integer,
}

impl AttributeKind {
    pub fn value_type(self) -> Option<ValueType> {
        match self {
            AttributeKind::Name | AttributeKind::VarName | AttributeKind::ProcName => {
                Some(ValueType::Name)
            }
            AttributeKind::Value | AttributeKind::StmtNo | AttributeKind::Integer => {
                Some(ValueType::Integer)
            }
            AttributeKind::None => None,
        }
    }
}

/// Design abstractions. The `T` suffix is the transitive (`*`) form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relationship {
    Follows,
    FollowsT,
    Parent,
    ParentT,
    Modifies,
    Uses,
    Calls,
    CallsT,
    Next,
    NextT,
    Affects,
    AffectsT,
    NextBip,
    NextBipT,
    AffectsBip,
    AffectsBipT,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DesignEntity {
    kind: DesignEntityKind,
    synonym: Synonym,
}

impl DesignEntity {
    pub fn new(kind: DesignEntityKind, synonym: impl Into<Synonym>) -> Result<Self> {
        let synonym = synonym.into();
        if synonym.is_empty() {
            return Err(PqlError::semantic("design entity synonym must not be empty"));
        }
        Ok(Self { kind, synonym })
    }

    pub fn kind(&self) -> DesignEntityKind {
        self.kind
    }

    pub fn synonym(&self) -> &str {
        &self.synonym
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClauseParam {
    Entity(DesignEntity),
    Name(String),
    Index(u32),
    /// A compiled pattern expression in postfix order. `is_wildcard` marks a
    /// `_"..."_` sub-expression match.
    Expression {
        tokens: Vec<Token>,
        is_wildcard: bool,
    },
    Wildcard,
}

impl ClauseParam {
    pub fn entity(&self) -> Option<&DesignEntity> {
        match self {
            ClauseParam::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Synonyms and wildcards leave a slot for the evaluator to fill.
    pub fn is_free(&self) -> bool {
        matches!(self, ClauseParam::Entity(_) | ClauseParam::Wildcard)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    SuchThat,
    Pattern,
    With,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Clause {
    SuchThat(SuchThatClause),
    Pattern(PatternClause),
    With(WithClause),
}

impl Clause {
    pub fn kind(&self) -> ClauseKind {
        match self {
            Clause::SuchThat(_) => ClauseKind::SuchThat,
            Clause::Pattern(_) => ClauseKind::Pattern,
            Clause::With(_) => ClauseKind::With,
        }
    }

    /// Every design entity the clause mentions, in source order.
    pub fn entities(&self) -> Vec<&DesignEntity> {
        match self {
            Clause::SuchThat(clause) => [&clause.lhs, &clause.rhs]
                .into_iter()
                .filter_map(ClauseParam::entity)
                .collect(),
            Clause::Pattern(clause) => std::iter::once(clause.entity())
                .chain(clause.lhs().entity())
                .collect(),
            Clause::With(clause) => [&clause.lhs, &clause.rhs]
                .into_iter()
                .filter_map(|side| side.param().entity())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SuchThatClause {
    pub relation: Relationship,
    pub lhs: ClauseParam,
    pub rhs: ClauseParam,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PatternClause {
    entity: DesignEntity,
    lhs: ClauseParam,
    rhs: ClauseParam,
}

impl PatternClause {
    pub fn new(entity: DesignEntity, lhs: ClauseParam, rhs: ClauseParam) -> Result<Self> {
        if !entity.kind().is_pattern_target() {
            return Err(PqlError::semantic(format!(
                "'{}' is not an assign, while or if synonym",
                entity.synonym()
            )));
        }
        Ok(Self { entity, lhs, rhs })
    }

    pub fn entity(&self) -> &DesignEntity {
        &self.entity
    }

    pub fn lhs(&self) -> &ClauseParam {
        &self.lhs
    }

    pub fn rhs(&self) -> &ClauseParam {
        &self.rhs
    }
}

/// One side of a `with` clause.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WithRef {
    param: ClauseParam,
    attribute: AttributeKind,
}

impl WithRef {
    pub fn new(param: ClauseParam, attribute: AttributeKind) -> Result<Self> {
        let congruent = match (&param, attribute) {
            (ClauseParam::Index(_), AttributeKind::Integer) => true,
            (ClauseParam::Name(_), AttributeKind::Name) => true,
            (ClauseParam::Entity(_), AttributeKind::None) => true,
            (ClauseParam::Entity(entity), attribute) => entity.kind().supports(attribute),
            _ => false,
        };
        if !congruent {
            return Err(PqlError::semantic(format!(
                "attribute {:?} does not apply to {}",
                attribute, param
            )));
        }
        Ok(Self { param, attribute })
    }

    pub fn param(&self) -> &ClauseParam {
        &self.param
    }

    pub fn attribute(&self) -> AttributeKind {
        self.attribute
    }

    /// `None` for bare synonyms whose kind carries no value of its own.
    pub fn value_type(&self) -> Option<ValueType> {
        match (&self.param, self.attribute) {
            (ClauseParam::Entity(entity), AttributeKind::None)
                if entity.kind() == DesignEntityKind::ProgLine =>
            {
                Some(ValueType::Integer)
            }
            (_, attribute) => attribute.value_type(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WithClause {
    pub lhs: WithRef,
    pub rhs: WithRef,
}

impl WithClause {
    pub fn new(lhs: WithRef, rhs: WithRef) -> Result<Self> {
        if let (Some(left), Some(right)) = (lhs.value_type(), rhs.value_type()) {
            if left != right {
                return Err(PqlError::semantic(format!(
                    "cannot compare {} with {}",
                    lhs, rhs
                )));
            }
        }
        Ok(Self { lhs, rhs })
    }
}

/// A `synonym.attribute` reference in the selection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttrRef {
    entity: DesignEntity,
    attribute: AttributeKind,
}

impl AttrRef {
    pub fn new(entity: DesignEntity, attribute: AttributeKind) -> Result<Self> {
        if !entity.kind().supports(attribute) {
            return Err(PqlError::semantic(format!(
                "attribute {:?} does not apply to '{}'",
                attribute,
                entity.synonym()
            )));
        }
        Ok(Self { entity, attribute })
    }

    pub fn entity(&self) -> &DesignEntity {
        &self.entity
    }

    pub fn attribute(&self) -> AttributeKind {
        self.attribute
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelectedEntity {
    Entity(DesignEntity),
    Boolean,
    Attribute(AttrRef),
}

impl SelectedEntity {
    pub fn entity(&self) -> Option<&DesignEntity> {
        match self {
            SelectedEntity::Entity(entity) => Some(entity),
            SelectedEntity::Attribute(attr) => Some(attr.entity()),
            SelectedEntity::Boolean => None,
        }
    }
}

/// A parsed query: what to select and the clauses constraining it, in the
/// order they were written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Query {
    selection: Vec<SelectedEntity>,
    clauses: Vec<Clause>,
}

impl Query {
    pub fn new(selection: Vec<SelectedEntity>) -> Self {
        Self {
            selection,
            clauses: Vec::new(),
        }
    }

    pub fn select(&mut self, selected: SelectedEntity) {
        self.selection.push(selected);
    }

    pub fn add_clause(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn selection(&self) -> &[SelectedEntity] {
        &self.selection
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.selection.as_slice(), [SelectedEntity::Boolean])
    }

    pub fn is_tuple(&self) -> bool {
        self.selection.len() > 1
    }

    /// Every synonym the query uses, once each, in order of first use.
    pub fn declarations(&self) -> Vec<&DesignEntity> {
        self.selection
            .iter()
            .filter_map(SelectedEntity::entity)
            .chain(self.clauses.iter().flat_map(Clause::entities))
            .filter(|entity| entity.kind() != DesignEntityKind::Wildcard)
            .unique_by(|entity| entity.synonym().to_owned())
            .collect()
    }
}

impl fmt::Display for DesignEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.synonym)
    }
}

impl fmt::Display for ClauseParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseParam::Entity(entity) => write!(f, "{}", entity),
            ClauseParam::Name(name) => write!(f, "\"{}\"", name),
            ClauseParam::Index(index) => write!(f, "{}", index),
            ClauseParam::Expression {
                tokens,
                is_wildcard,
            } => {
                // Hand-built token lists may not be valid postfix.
                let text = match compiler::to_infix(tokens) {
                    Ok(infix) => infix,
                    Err(_) => compiler::Postfix(tokens).to_string(),
                };
                if *is_wildcard {
                    write!(f, "_\"{}\"_", text)
                } else {
                    write!(f, "\"{}\"", text)
                }
            }
            ClauseParam::Wildcard => f.write_str("_"),
        }
    }
}

impl fmt::Display for WithRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.param, self.attribute.keyword()) {
            (ClauseParam::Entity(entity), Some(keyword)) => write!(f, "{}.{}", entity, keyword),
            (param, _) => write!(f, "{}", param),
        }
    }
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity)?;
        if let Some(keyword) = self.attribute.keyword() {
            write!(f, ".{}", keyword)?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectedEntity::Entity(entity) => write!(f, "{}", entity),
            SelectedEntity::Boolean => f.write_str("BOOLEAN"),
            SelectedEntity::Attribute(attr) => write!(f, "{}", attr),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind().keyword())?;
        match self {
            Clause::SuchThat(clause) => write!(
                f,
                " {}({}, {})",
                clause.relation.keyword(),
                clause.lhs,
                clause.rhs
            ),
            Clause::Pattern(clause) => {
                write!(f, " {}({}, {}", clause.entity, clause.lhs, clause.rhs)?;
                if clause.entity.kind() == DesignEntityKind::If {
                    f.write_str(", _")?;
                }
                f.write_str(")")
            }
            Clause::With(clause) => write!(f, " {} = {}", clause.lhs, clause.rhs),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entity in self.declarations() {
            write!(f, "{} {}; ", entity.kind().keyword(), entity)?;
        }

        f.write_str("Select ")?;
        match self.selection.as_slice() {
            // A bare `Select BOOLEAN` would read back as a boolean selection.
            [SelectedEntity::Entity(entity)] if entity.synonym() == "BOOLEAN" => {
                write!(f, "<{}>", entity)?
            }
            [single] => write!(f, "{}", single)?,
            many => write!(f, "<{}>", many.iter().join(", "))?,
        }

        for clause in &self.clauses {
            write!(f, " {}", clause)?;
        }
        Ok(())
    }
}
