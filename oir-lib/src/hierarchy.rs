use std::collections::{BTreeSet, VecDeque};

use crate::ir::{CallKind, ClassId, Invoke, MethodId, Program, SubsigId, Type};

/// Direct subtype relations of every class and interface, the inverse of
/// the `extends`/`implements` clauses.
#[derive(Clone, Debug, Default)]
pub struct ClassHierarchy {
    direct_subclasses: Vec<Vec<ClassId>>,
    direct_subinterfaces: Vec<Vec<ClassId>>,
    direct_implementors: Vec<Vec<ClassId>>,
}

impl ClassHierarchy {
    pub fn new(program: &Program) -> Self {
        let class_count = program.class_ids().count();
        let mut hierarchy = Self {
            direct_subclasses: vec![Vec::new(); class_count],
            direct_subinterfaces: vec![Vec::new(); class_count],
            direct_implementors: vec![Vec::new(); class_count],
        };
        for id in program.class_ids() {
            let class = program.class(id);
            if let Some(super_class) = class.super_class {
                hierarchy.direct_subclasses[super_class.0].push(id);
            }
            for &interface in &class.interfaces {
                if class.is_interface {
                    hierarchy.direct_subinterfaces[interface.0].push(id);
                } else {
                    hierarchy.direct_implementors[interface.0].push(id);
                }
            }
        }
        hierarchy
    }

    pub fn direct_subclasses_of(&self, class: ClassId) -> &[ClassId] {
        &self.direct_subclasses[class.0]
    }

    pub fn direct_subinterfaces_of(&self, interface: ClassId) -> &[ClassId] {
        &self.direct_subinterfaces[interface.0]
    }

    pub fn direct_implementors_of(&self, interface: ClassId) -> &[ClassId] {
        &self.direct_implementors[interface.0]
    }

    /// Find a method with the given subsignature declared in `class` or
    /// the closest superclass, abstract ones included.
    pub fn lookup(&self, program: &Program, class: ClassId, subsig: SubsigId) -> Option<MethodId> {
        let mut current = Some(class);
        while let Some(c) = current {
            if let Some(method) = program.class(c).declared_method(subsig) {
                return Some(method);
            }
            current = program.class(c).super_class;
        }
        None
    }

    /// Virtual dispatch: the first non-abstract method with the given
    /// subsignature in `class` or its superclasses.
    pub fn dispatch(
        &self,
        program: &Program,
        class: ClassId,
        subsig: SubsigId,
    ) -> Option<MethodId> {
        let mut current = Some(class);
        while let Some(c) = current {
            let declared = program.class(c).declared_method(subsig);
            if let Some(method) = declared.filter(|&m| !program.method(m).is_abstract) {
                return Some(method);
            }
            current = program.class(c).super_class;
        }
        None
    }

    /// Every class and interface below `class`, including itself, in
    /// breadth-first order.
    pub fn subtypes_of(&self, class: ClassId) -> Vec<ClassId> {
        let mut seen = BTreeSet::from([class]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([class]);
        while let Some(current) = queue.pop_front() {
            order.push(current);
            let below = self
                .direct_subclasses_of(current)
                .iter()
                .chain(self.direct_subinterfaces_of(current))
                .chain(self.direct_implementors_of(current));
            for &sub in below {
                if seen.insert(sub) {
                    queue.push_back(sub);
                }
            }
        }
        order
    }

    /// Resolve the callee of a call site for a receiver of type `receiver`.
    /// Static calls ignore the receiver, special calls dispatch on the
    /// declaring class, virtual and interface calls on the receiver type.
    pub fn resolve_callee(
        &self,
        program: &Program,
        receiver: Option<&Type>,
        invoke: &Invoke,
    ) -> Option<MethodId> {
        let subsig = invoke.method_ref.subsignature;
        match invoke.kind {
            CallKind::Static => self.lookup(program, invoke.method_ref.class, subsig),
            CallKind::Special => self.dispatch(program, invoke.method_ref.class, subsig),
            CallKind::Virtual | CallKind::Interface => {
                self.dispatch(program, receiver?.class()?, subsig)
            }
            CallKind::Dynamic => None,
        }
    }
}
