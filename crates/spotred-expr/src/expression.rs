//! Named expressions.

use spotred_core::SpotKind;

use crate::node::Node;

/// Applicability and evaluation flags of an [`Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ExpressionFlags {
    /// Registered by the engine rather than the user.
    pub built_in: bool,
    /// Evaluated for reference-material spots.
    pub reference_material: bool,
    /// Evaluated for unknown spots.
    pub unknown: bool,
    /// Evaluated once over a spot group rather than once per spot.
    pub root_evaluable: bool,
}

impl Default for ExpressionFlags {
    fn default() -> Self {
        Self {
            built_in: false,
            reference_material: true,
            unknown: true,
            root_evaluable: false,
        }
    }
}

/// A named expression tree with its flags.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expression {
    /// Unique name within a registry.
    pub name: String,
    /// Formula.
    pub tree: Node,
    /// Flags.
    #[cfg_attr(feature = "serde", serde(default))]
    pub flags: ExpressionFlags,
}

impl Expression {
    /// Per-spot expression applying to every spot kind.
    pub fn per_spot(name: impl Into<String>, tree: Node) -> Self {
        Self {
            name: name.into(),
            tree,
            flags: ExpressionFlags::default(),
        }
    }

    /// Summary expression applying to every spot kind.
    pub fn summary(name: impl Into<String>, tree: Node) -> Self {
        let mut expression = Self::per_spot(name, tree);
        expression.flags.root_evaluable = true;
        expression
    }

    /// Restricts the expression to reference-material spots.
    pub fn reference_material_only(mut self) -> Self {
        self.flags.reference_material = true;
        self.flags.unknown = false;
        self
    }

    /// Restricts the expression to unknown spots.
    pub fn unknown_only(mut self) -> Self {
        self.flags.reference_material = false;
        self.flags.unknown = true;
        self
    }

    /// Marks the expression as engine-provided.
    pub fn built_in(mut self) -> Self {
        self.flags.built_in = true;
        self
    }

    /// Whether the expression is evaluated for spots of `kind`.
    pub fn applies_to(&self, kind: SpotKind) -> bool {
        match kind {
            SpotKind::ReferenceMaterial => self.flags.reference_material,
            SpotKind::Unknown => self.flags.unknown,
        }
    }

    /// Whether the expression is evaluated once over a spot group.
    pub fn is_summary(&self) -> bool {
        self.flags.root_evaluable
    }
}
