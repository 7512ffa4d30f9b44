use core::fmt::Write;
use std::collections::HashMap;

use itertools::Itertools;

use crate::hierarchy::ClassHierarchy;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);
    };
}

id_type!(ClassId);
id_type!(FieldId);
id_type!(MethodId);
id_type!(VarId);
id_type!(
    /// An interned method subsignature like `int foo(int,A)`.
    SubsigId
);

/// A statement identified by its method and its index in the body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtRef {
    pub method: MethodId,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Int,
    Boolean,
    Byte,
    Short,
    Char,
    Long,
    Float,
    Double,
    Void,
    Class(ClassId),
    Array(Box<Type>),
}

impl Type {
    /// Types whose values fit a 32-bit integer.
    pub fn can_hold_int(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Boolean | Type::Byte | Type::Short | Type::Char
        )
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Class(_) | Type::Array(_))
    }

    pub fn class(&self) -> Option<ClassId> {
        match self {
            Type::Class(c) => Some(*c),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Class {
    pub name: String,
    pub super_class: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub is_interface: bool,
    pub is_abstract: bool,
    /// Referenced but never declared, e.g., library classes.
    pub is_phantom: bool,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    pub(crate) declared_methods: HashMap<SubsigId, MethodId>,
}

impl Class {
    pub fn declared_method(&self, subsig: SubsigId) -> Option<MethodId> {
        self.declared_methods.get(&subsig).copied()
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub class: ClassId,
    pub ty: Type,
    pub is_static: bool,
}

#[derive(Clone, Debug)]
pub struct Var {
    pub name: String,
    pub ty: Type,
    pub method: MethodId,
    /// Dense index among the variables of the declaring method.
    pub local: usize,
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub class: ClassId,
    pub subsignature: SubsigId,
    pub param_types: Vec<Type>,
    pub ret_type: Type,
    pub is_static: bool,
    pub is_abstract: bool,
    pub this: Option<VarId>,
    pub params: Vec<VarId>,
    pub vars: Vec<VarId>,
    pub stmts: Vec<Stmt>,
    pub stmt_lines: Vec<u32>,
    pub return_vars: Vec<VarId>,
}

/// A reference to a method as written at a call site. It is resolved to a
/// declaration by the class hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: ClassId,
    pub subsignature: SubsigId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | Ne | Lt | Gt | Le | Ge)
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
            And => "&",
            Or => "|",
            Xor => "^",
            Shl => "<<",
            Shr => ">>",
            Ushr => ">>>",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
        }
    }
}

/// The right-hand side of a plain assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Exp {
    Var(VarId),
    Int(i32),
    Binary(BinaryOp, VarId, VarId),
    Cast(Type, VarId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallKind {
    Static,
    Special,
    Virtual,
    Interface,
    Dynamic,
}

impl CallKind {
    fn keyword(self) -> &'static str {
        match self {
            CallKind::Static => "staticinvoke",
            CallKind::Special => "specialinvoke",
            CallKind::Virtual => "virtualinvoke",
            CallKind::Interface => "interfaceinvoke",
            CallKind::Dynamic => "dynamicinvoke",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invoke {
    pub kind: CallKind,
    pub method_ref: MethodRef,
    pub base: Option<VarId>,
    pub args: Vec<VarId>,
    pub result: Option<VarId>,
}

/// A three-address statement. Jump targets are statement indices within
/// the same method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// Allocation of an object or, with a length, an array of `ty`'s
    /// element type.
    New {
        lhs: VarId,
        ty: Type,
        length: Option<VarId>,
    },
    Assign {
        lhs: VarId,
        rhs: Exp,
    },
    /// A `None` base reads a static field.
    LoadField {
        lhs: VarId,
        base: Option<VarId>,
        field: FieldId,
    },
    StoreField {
        base: Option<VarId>,
        field: FieldId,
        rhs: VarId,
    },
    LoadArray {
        lhs: VarId,
        base: VarId,
        index: VarId,
    },
    StoreArray {
        base: VarId,
        index: VarId,
        rhs: VarId,
    },
    Invoke(Invoke),
    If {
        lhs: VarId,
        op: BinaryOp,
        rhs: VarId,
        target: usize,
    },
    Goto {
        target: usize,
    },
    Switch {
        var: VarId,
        cases: Vec<(i32, usize)>,
        default: usize,
    },
    Return(Option<VarId>),
    Nop,
}

impl Stmt {
    /// The variable this statement assigns, if any.
    pub fn def(&self) -> Option<VarId> {
        match self {
            Stmt::New { lhs, .. }
            | Stmt::Assign { lhs, .. }
            | Stmt::LoadField { lhs, .. }
            | Stmt::LoadArray { lhs, .. } => Some(*lhs),
            Stmt::Invoke(invoke) => invoke.result,
            Stmt::StoreField { .. }
            | Stmt::StoreArray { .. }
            | Stmt::If { .. }
            | Stmt::Goto { .. }
            | Stmt::Switch { .. }
            | Stmt::Return(_)
            | Stmt::Nop => None,
        }
    }

    /// The variables this statement reads.
    pub fn uses(&self) -> Vec<VarId> {
        match self {
            Stmt::New { length, .. } => length.iter().copied().collect(),
            Stmt::Assign { rhs, .. } => match rhs {
                Exp::Var(v) | Exp::Cast(_, v) => vec![*v],
                Exp::Int(_) => Vec::new(),
                Exp::Binary(_, l, r) => vec![*l, *r],
            },
            Stmt::LoadField { base, .. } => base.iter().copied().collect(),
            Stmt::StoreField { base, rhs, .. } => base.iter().copied().chain([*rhs]).collect(),
            Stmt::LoadArray { base, index, .. } => vec![*base, *index],
            Stmt::StoreArray { base, index, rhs } => vec![*base, *index, *rhs],
            Stmt::Invoke(invoke) => invoke.base.iter().chain(&invoke.args).copied().collect(),
            Stmt::If { lhs, rhs, .. } => vec![*lhs, *rhs],
            Stmt::Switch { var, .. } => vec![*var],
            Stmt::Return(value) => value.iter().copied().collect(),
            Stmt::Goto { .. } | Stmt::Nop => Vec::new(),
        }
    }

    pub fn as_invoke(&self) -> Option<&Invoke> {
        match self {
            Stmt::Invoke(invoke) => Some(invoke),
            _ => None,
        }
    }

    pub(crate) fn targets_mut(&mut self) -> Vec<&mut usize> {
        match self {
            Stmt::If { target, .. } | Stmt::Goto { target } => vec![target],
            Stmt::Switch { cases, default, .. } => cases
                .iter_mut()
                .map(|(_, target)| target)
                .chain([default])
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn targets(&self) -> Vec<usize> {
        match self {
            Stmt::If { target, .. } | Stmt::Goto { target } => vec![*target],
            Stmt::Switch { cases, default, .. } => {
                cases.iter().map(|&(_, t)| t).chain([*default]).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Statements of the program that access memory through a variable, so
/// pointer analyses can react when the variable points to new objects.
#[derive(Clone, Debug, Default)]
pub struct VarUses {
    pub load_fields: Vec<StmtRef>,
    pub store_fields: Vec<StmtRef>,
    pub load_arrays: Vec<StmtRef>,
    pub store_arrays: Vec<StmtRef>,
    /// Calls with this variable as the receiver.
    pub invokes: Vec<StmtRef>,
}

/// The analyzed world: every class, member, variable, and statement,
/// together with the class hierarchy. Everything else refers to its parts
/// through dense ids.
#[derive(Clone, Debug, Default)]
pub struct Program {
    classes: Vec<Class>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    vars: Vec<Var>,
    subsignatures: Vec<String>,
    class_index: HashMap<String, ClassId>,
    subsig_index: HashMap<String, SubsigId>,
    var_uses: Vec<VarUses>,
    hierarchy: ClassHierarchy,
}

impl Program {
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0]
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0]
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + use<> {
        (0..self.classes.len()).map(ClassId)
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> + use<> {
        (0..self.methods.len()).map(MethodId)
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn stmt(&self, stmt: StmtRef) -> &Stmt {
        &self.method(stmt.method).stmts[stmt.index]
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn var_uses(&self, var: VarId) -> &VarUses {
        &self.var_uses[var.0]
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_index.get(name).copied()
    }

    pub fn subsignature(&self, id: SubsigId) -> &str {
        &self.subsignatures[id.0]
    }

    pub fn subsignature_id(&self, subsig: &str) -> Option<SubsigId> {
        self.subsig_index.get(subsig).copied()
    }

    /// The full signature of a method, e.g., `<A: int foo(int,A)>`.
    pub fn method_signature(&self, id: MethodId) -> String {
        let method = self.method(id);
        format!(
            "<{}: {}>",
            self.class(method.class).name,
            self.subsignature(method.subsignature)
        )
    }

    pub fn method_ref_signature(&self, method_ref: MethodRef) -> String {
        format!(
            "<{}: {}>",
            self.class(method_ref.class).name,
            self.subsignature(method_ref.subsignature)
        )
    }

    /// Look up a method declared exactly in the named class by its full
    /// signature. Whitespace after commas is ignored.
    pub fn method_by_signature(&self, signature: &str) -> Option<MethodId> {
        let inner = signature.trim().strip_prefix('<')?.strip_suffix('>')?;
        let (class, subsig) = inner.split_once(':')?;
        let class = self.class_by_name(class.trim())?;
        let subsig = self.subsignature_id(&normalize_subsignature(subsig))?;
        self.class(class).declared_method(subsig)
    }

    /// The method analyses start from: the first static method named
    /// `main`.
    pub fn main_method(&self) -> Option<MethodId> {
        self.method_ids().find(|&m| {
            let method = self.method(m);
            method.is_static && method.name == "main" && !method.stmts.is_empty()
        })
    }

    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Int => "int".to_owned(),
            Type::Boolean => "boolean".to_owned(),
            Type::Byte => "byte".to_owned(),
            Type::Short => "short".to_owned(),
            Type::Char => "char".to_owned(),
            Type::Long => "long".to_owned(),
            Type::Float => "float".to_owned(),
            Type::Double => "double".to_owned(),
            Type::Void => "void".to_owned(),
            Type::Class(c) => self.class(*c).name.clone(),
            Type::Array(elem) => format!("{}[]", self.type_name(elem)),
        }
    }

    /// Parse a type written the way [`Program::type_name`] prints it.
    pub fn type_by_name(&self, name: &str) -> Option<Type> {
        let name = name.trim();
        if let Some(elem) = name.strip_suffix("[]") {
            return Some(Type::Array(Box::new(self.type_by_name(elem)?)));
        }
        let ty = match name {
            "int" => Type::Int,
            "boolean" => Type::Boolean,
            "byte" => Type::Byte,
            "short" => Type::Short,
            "char" => Type::Char,
            "long" => Type::Long,
            "float" => Type::Float,
            "double" => Type::Double,
            "void" => Type::Void,
            class => Type::Class(self.class_by_name(class)?),
        };
        Some(ty)
    }

    pub fn var_name(&self, var: VarId) -> &str {
        &self.var(var).name
    }

    /// Render a statement the same way the parser reads it. Jump targets are
    /// printed as `L<index>` labels.
    pub fn stmt_to_string(&self, stmt: &Stmt) -> String {
        let v = |var: &VarId| self.var_name(*var);
        let field_access = |base: &Option<VarId>, field: &FieldId| {
            let field = self.field(*field);
            match base {
                Some(base) => format!("{}.{}", v(base), field.name),
                None => format!("{}.{}", self.class(field.class).name, field.name),
            }
        };
        match stmt {
            Stmt::New {
                lhs,
                ty: Type::Array(elem),
                length: Some(length),
            } => format!("{} = new {}[{}];", v(lhs), self.type_name(elem), v(length)),
            Stmt::New { lhs, ty, .. } => format!("{} = new {};", v(lhs), self.type_name(ty)),
            Stmt::Assign { lhs, rhs } => {
                let rhs = match rhs {
                    Exp::Var(var) => v(var).to_owned(),
                    Exp::Int(i) => i.to_string(),
                    Exp::Binary(op, l, r) => format!("{} {} {}", v(l), op.symbol(), v(r)),
                    Exp::Cast(ty, var) => format!("({}) {}", self.type_name(ty), v(var)),
                };
                format!("{} = {rhs};", v(lhs))
            }
            Stmt::LoadField { lhs, base, field } => {
                format!("{} = {};", v(lhs), field_access(base, field))
            }
            Stmt::StoreField { base, field, rhs } => {
                format!("{} = {};", field_access(base, field), v(rhs))
            }
            Stmt::LoadArray { lhs, base, index } => {
                format!("{} = {}[{}];", v(lhs), v(base), v(index))
            }
            Stmt::StoreArray { base, index, rhs } => {
                format!("{}[{}] = {};", v(base), v(index), v(rhs))
            }
            Stmt::Invoke(invoke) => {
                let mut text = String::new();
                if let Some(result) = &invoke.result {
                    write!(text, "{} = ", v(result)).unwrap();
                }
                text.push_str(invoke.kind.keyword());
                text.push(' ');
                if let Some(base) = &invoke.base {
                    write!(text, "{}.", v(base)).unwrap();
                }
                let args = invoke.args.iter().map(v).join(", ");
                write!(text, "{}({args});", self.method_ref_signature(invoke.method_ref)).unwrap();
                text
            }
            Stmt::If {
                lhs,
                op,
                rhs,
                target,
            } => format!("if {} {} {} goto L{target};", v(lhs), op.symbol(), v(rhs)),
            Stmt::Goto { target } => format!("goto L{target};"),
            Stmt::Switch {
                var,
                cases,
                default,
            } => {
                let cases = cases
                    .iter()
                    .map(|(value, target)| format!("case {value}: L{target}; "))
                    .join("");
                format!("switch ({}) {{ {cases}default: L{default}; }}", v(var))
            }
            Stmt::Return(Some(var)) => format!("return {};", v(var)),
            Stmt::Return(None) => "return;".to_owned(),
            Stmt::Nop => "nop;".to_owned(),
        }
    }

    /// A statement with its position, e.g.,
    /// `<A: void main()>[2@L7] x = y;`.
    pub fn describe_stmt(&self, stmt: StmtRef) -> String {
        let method = self.method(stmt.method);
        format!(
            "{}[{}@L{}] {}",
            self.method_signature(stmt.method),
            stmt.index,
            method.stmt_lines[stmt.index],
            self.stmt_to_string(&method.stmts[stmt.index])
        )
    }

    /// Print the body of a method. The `annotate` callback can attach a
    /// comment to each statement, e.g., the analysis state after it.
    pub fn print_method(&self, id: MethodId, annotate: impl Fn(usize) -> Option<String>) -> String {
        let method = self.method(id);
        let labels: Vec<usize> = method.stmts.iter().flat_map(Stmt::targets).collect();
        let mut output = format!("{} {{\n", self.method_signature(id));
        for (index, stmt) in method.stmts.iter().enumerate() {
            if labels.contains(&index) {
                writeln!(output, "L{index}:").unwrap();
            }
            write!(output, "  {}", self.stmt_to_string(stmt)).unwrap();
            if let Some(annotation) = annotate(index) {
                write!(output, " /* {annotation} */").unwrap();
            }
            output.push('\n');
        }
        output.push_str("}\n");
        output
    }

    ////////////////////////////////////////////////////
    // Construction, used by the parser.              //
    ////////////////////////////////////////////////////

    /// Returns the class with the given name, creating a phantom class when
    /// it was not seen before.
    pub(crate) fn class_or_phantom(&mut self, name: &str) -> ClassId {
        if let Some(id) = self.class_by_name(name) {
            return id;
        }
        let id = ClassId(self.classes.len());
        self.classes.push(Class {
            name: name.to_owned(),
            super_class: None,
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            is_phantom: true,
            fields: Vec::new(),
            methods: Vec::new(),
            declared_methods: HashMap::new(),
        });
        self.class_index.insert(name.to_owned(), id);
        id
    }

    pub(crate) fn class_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.0]
    }

    pub(crate) fn method_mut(&mut self, id: MethodId) -> &mut Method {
        &mut self.methods[id.0]
    }

    pub(crate) fn intern_subsignature(&mut self, subsig: &str) -> SubsigId {
        if let Some(id) = self.subsignature_id(subsig) {
            return id;
        }
        let id = SubsigId(self.subsignatures.len());
        self.subsignatures.push(subsig.to_owned());
        self.subsig_index.insert(subsig.to_owned(), id);
        id
    }

    pub(crate) fn add_field(
        &mut self,
        class: ClassId,
        name: &str,
        ty: Type,
        is_static: bool,
    ) -> FieldId {
        let id = FieldId(self.fields.len());
        self.fields.push(Field {
            name: name.to_owned(),
            class,
            ty,
            is_static,
        });
        self.class_mut(class).fields.push(id);
        id
    }

    /// Find a field declared in `class` or one of its superclasses.
    pub fn resolve_field(&self, class: ClassId, name: &str) -> Option<FieldId> {
        let mut current = Some(class);
        while let Some(c) = current {
            let class = self.class(c);
            if let Some(&f) = class.fields.iter().find(|&&f| self.field(f).name == name) {
                return Some(f);
            }
            current = class.super_class;
        }
        None
    }

    pub(crate) fn add_method(&mut self, method: Method) -> MethodId {
        let id = MethodId(self.methods.len());
        let class = self.class_mut(method.class);
        class.methods.push(id);
        class.declared_methods.insert(method.subsignature, id);
        self.methods.push(method);
        id
    }

    pub(crate) fn add_var(&mut self, method: MethodId, name: &str, ty: Type) -> VarId {
        let id = VarId(self.vars.len());
        let local = self.method(method).vars.len();
        self.vars.push(Var {
            name: name.to_owned(),
            ty,
            method,
            local,
        });
        self.method_mut(method).vars.push(id);
        id
    }

    /// Build the indices that depend on complete method bodies.
    pub(crate) fn finish(&mut self) {
        let mut var_uses = vec![VarUses::default(); self.vars.len()];
        for method in self.method_ids() {
            for (index, stmt) in self.method(method).stmts.iter().enumerate() {
                let at = StmtRef { method, index };
                match stmt {
                    Stmt::LoadField { base: Some(b), .. } => var_uses[b.0].load_fields.push(at),
                    Stmt::StoreField { base: Some(b), .. } => var_uses[b.0].store_fields.push(at),
                    Stmt::LoadArray { base, .. } => var_uses[base.0].load_arrays.push(at),
                    Stmt::StoreArray { base, .. } => var_uses[base.0].store_arrays.push(at),
                    Stmt::Invoke(Invoke { base: Some(b), .. }) => var_uses[b.0].invokes.push(at),
                    _ => {}
                }
            }
        }
        self.var_uses = var_uses;
        self.hierarchy = ClassHierarchy::new(self);
    }
}

/// Canonical spelling of a subsignature: single spaces between the return
/// type and the name, no spaces inside the parameter list.
pub fn normalize_subsignature(subsig: &str) -> String {
    let subsig = subsig.trim();
    let Some((head, params)) = subsig.split_once('(') else {
        return subsig.to_owned();
    };
    let head = head.split_whitespace().join(" ");
    let params = params
        .trim_end()
        .trim_end_matches(')')
        .split(',')
        .map(|p| p.split_whitespace().join(""))
        .filter(|p| !p.is_empty())
        .join(",");
    format!("{head}({params})")
}
