//! The validated, immutable model of one node.

use std::ops::Index;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tessel_diagnostic::Diagnostic;
use tessel_ir::{Name, SharedInterner};
use tessel_types::{SharedTypeSystem, TypeIdx};

use crate::expr::FunctionTable;
use crate::specialization::{SpecId, Specialization};
use crate::ModelOptions;

/// Errors that prevented a model from being built.
#[derive(Clone, Debug, thiserror::Error)]
#[error("specialization model has {} error(s)", .diagnostics.len())]
pub struct ModelErrors {
    pub diagnostics: Vec<Diagnostic>,
}

/// All specializations of one polymorphic operation, validated and
/// annotated with reachability, closed `contains` sets and cast orders.
#[derive(Debug)]
pub struct NodeModel {
    name: Name,
    signature: SmallVec<[TypeIdx; 4]>,
    specializations: Vec<Specialization>,
    fallback: Option<SpecId>,
    generic: Option<SpecId>,
    cast_order: FxHashMap<(usize, TypeIdx), SmallVec<[TypeIdx; 4]>>,
    types: SharedTypeSystem,
    interner: SharedInterner,
    functions: FunctionTable,
    options: ModelOptions,
    warnings: Vec<Diagnostic>,
}

impl NodeModel {
    #[expect(clippy::too_many_arguments, reason = "only called by the builder")]
    pub(crate) fn assemble(
        name: Name,
        signature: SmallVec<[TypeIdx; 4]>,
        specializations: Vec<Specialization>,
        types: SharedTypeSystem,
        interner: SharedInterner,
        functions: FunctionTable,
        options: ModelOptions,
        warnings: Vec<Diagnostic>,
    ) -> Self {
        let fallback = specializations
            .iter()
            .find(|s| s.is_fallback())
            .map(|s| s.id);
        let generic = pick_generic(&specializations, fallback);
        let cast_order = implicit_cast_order(&specializations, &types);
        NodeModel {
            name,
            signature,
            specializations,
            fallback,
            generic,
            cast_order,
            types,
            interner,
            functions,
            options,
            warnings,
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    /// Node name resolved through the interner.
    pub fn display_name(&self) -> &'static str {
        self.interner.lookup(self.name)
    }

    /// Name of a specialization.
    pub fn spec_name(&self, id: SpecId) -> &'static str {
        self.interner.lookup(self[id].name)
    }

    /// Types the children produce.
    pub fn signature(&self) -> &[TypeIdx] {
        &self.signature
    }

    pub fn arity(&self) -> usize {
        self.signature.len()
    }

    /// All specializations in declaration order, reachable or not.
    pub fn specializations(&self) -> &[Specialization] {
        &self.specializations
    }

    pub fn get(&self, id: SpecId) -> Option<&Specialization> {
        self.specializations.get(id.index())
    }

    pub fn by_name(&self, name: Name) -> Option<&Specialization> {
        self.specializations.iter().find(|s| s.name == name)
    }

    /// Reachable non-fallback specializations in declaration order.
    pub fn reachable(&self) -> impl Iterator<Item = &Specialization> {
        self.specializations
            .iter()
            .filter(|s| s.reachable && !s.is_fallback())
    }

    pub fn fallback(&self) -> Option<SpecId> {
        self.fallback
    }

    /// The specialization used once a node goes generic.
    ///
    /// The fallback when it is reachable; otherwise whatever shadows it, or
    /// the last reachable specialization flagged generic.
    pub fn generic(&self) -> Option<SpecId> {
        self.generic
    }

    /// Implicit sources of `target` at signature position `index`, in the
    /// order a value is tried against them.
    ///
    /// Sources some specialization declares at that position come first,
    /// in specialization declaration order; the rest follow in type system
    /// order.
    pub fn implicit_sources_in_use(&self, index: usize, target: TypeIdx) -> &[TypeIdx] {
        self.cast_order
            .get(&(index, target))
            .map_or_else(|| self.types.lookup_implicit_sources(target), SmallVec::as_slice)
    }

    pub fn types(&self) -> &SharedTypeSystem {
        &self.types
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    /// Non-fatal diagnostics from the build.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}

impl Index<SpecId> for NodeModel {
    type Output = Specialization;

    fn index(&self, id: SpecId) -> &Specialization {
        &self.specializations[id.index()]
    }
}

fn pick_generic(specs: &[Specialization], fallback: Option<SpecId>) -> Option<SpecId> {
    if let Some(fallback) = fallback {
        let spec = &specs[fallback.index()];
        return Some(if spec.reachable {
            fallback
        } else {
            spec.shadowed_by.unwrap_or(fallback)
        });
    }
    specs
        .iter()
        .rev()
        .find(|s| s.reachable && s.is_generic())
        .map(|s| s.id)
}

fn implicit_cast_order(
    specs: &[Specialization],
    types: &SharedTypeSystem,
) -> FxHashMap<(usize, TypeIdx), SmallVec<[TypeIdx; 4]>> {
    let mut order: FxHashMap<(usize, TypeIdx), SmallVec<[TypeIdx; 4]>> = FxHashMap::default();
    let reachable: Vec<&Specialization> = specs.iter().filter(|s| s.reachable).collect();
    for spec in &reachable {
        for guard in &spec.type_guards {
            let key = (guard.index, guard.ty);
            if order.contains_key(&key) {
                continue;
            }
            let all = types.lookup_implicit_sources(guard.ty);
            let mut sources: SmallVec<[TypeIdx; 4]> = SmallVec::new();
            for other in &reachable {
                let declared = other.param_type(guard.index);
                if all.contains(&declared) && !sources.contains(&declared) {
                    sources.push(declared);
                }
            }
            for source in all {
                if !sources.contains(source) {
                    sources.push(*source);
                }
            }
            order.insert(key, sources);
        }
    }
    order
}
