//! Text rendering of a decision tree.

use std::fmt::{self, Write as _};

use tessel_model::{Expr, NodeModel};

use crate::{Atom, DecisionTree, GroupKind, SpecializationGroup};

/// A [`DecisionTree`] with the model needed to print names.
pub struct TreeDisplay<'a> {
    tree: &'a DecisionTree,
    model: &'a NodeModel,
}

impl DecisionTree {
    pub fn display<'a>(&'a self, model: &'a NodeModel) -> TreeDisplay<'a> {
        TreeDisplay { tree: self, model }
    }
}

impl TreeDisplay<'_> {
    fn atom(&self, atom: Atom) -> String {
        match atom {
            Atom::Type(guard) => {
                let types = self.model.types();
                format!("#{} is {}", guard.index, types.name(guard.ty))
            }
            Atom::Guard(guard) => {
                let spec = &self.model[guard.spec];
                let g = &spec.guards[guard.index];
                let interner = self.model.interner();
                if g.negated {
                    Expr::negated(g.expr.clone()).display(interner).to_string()
                } else {
                    g.expr.display(interner).to_string()
                }
            }
        }
    }

    fn group(&self, f: &mut fmt::Formatter<'_>, group: &SpecializationGroup, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let mut line = indent.clone();
        if !group.atoms.is_empty() {
            line.push_str(if group.else_of.is_some() { "else " } else { "? " });
            for (i, atom) in group.atoms.iter().enumerate() {
                if i > 0 {
                    line.push_str(" && ");
                }
                line.push_str(&self.atom(*atom));
            }
        }
        match &group.kind {
            GroupKind::Leaf(spec) => {
                if !group.atoms.is_empty() {
                    line.push(' ');
                }
                let _ = write!(line, "-> {}", self.model.spec_name(*spec));
                writeln!(f, "{line}")
            }
            GroupKind::Children(children) => {
                writeln!(f, "{line}")?;
                for child in children {
                    self.group(f, child, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "node `{}`", self.model.display_name())?;
        for root in self.tree.roots() {
            self.group(f, root, 1)?;
        }
        if let Some(fallback) = self.tree.fallback() {
            writeln!(f, "  -> {} (fallback)", self.model.spec_name(fallback))?;
        }
        Ok(())
    }
}
