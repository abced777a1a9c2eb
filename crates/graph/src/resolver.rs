//! Call-site resolution.
//!
//! Every call expression in a function body (or in a file-level
//! initializer) produces exactly one `Calls` edge. Callee forms are tried in
//! a fixed order: local bindings (lambdas and traced function pointers),
//! function-pointer values, functors, qualified names, member calls through
//! the receiver's static type, and finally unqualified lookup through the
//! scope chain. Lookups that need declarations from other files are
//! deferred as [`PendingLookup`]s and replayed by the assembler.

use crate::descriptor::{is_builtin_type, lookup_name, normalize_spelling, TypeDescriptor};
use crate::extractor::{base_type, parse_parameters, walk_declarator, Extraction, FunctionBody};
use crate::file_graph::{EdgeTarget, PartialEdge, PendingLookup};
use crate::symbols::{enclosing_scopes, join_scope, Resolution, SymbolTable};
use crate::types::{
    Confidence, Diagnostic, DiagnosticKind, FunctionInfo, FunctionKind, Location, Relation, Symbol,
    SymbolDetail, SymbolId, SymbolKind,
};
use codegraph_parser::{AdaptedTree, Node, SemanticKind};
use std::collections::HashMap;

const INITIALIZER_NAME: &str = "<static initializer>";

/// Statement and expression nesting followed before a subtree is skipped
const MAX_NESTING: usize = 256;

/// Output of call resolution for one file
pub(crate) struct ResolvedCalls {
    /// Lambdas and the initializer pseudo-function
    pub symbols: Vec<Symbol>,
    pub edges: Vec<PartialEdge>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Static knowledge about an expression
#[derive(Debug, Clone, Default)]
struct ExprValue {
    ty: Option<TypeDescriptor>,
    /// Function the expression denotes (`add`, `&add`, a lambda)
    callable: Option<SymbolId>,
}

impl ExprValue {
    fn typed(ty: Option<TypeDescriptor>) -> Self {
        Self { ty, callable: None }
    }
}

/// Where a call goes before it becomes an edge
enum CallTarget {
    Resolved(Resolution),
    Pending(PendingLookup),
    Unresolved(String),
}

/// Resolution context of one body
#[derive(Clone)]
struct Context {
    caller: SymbolId,
    /// `qualified(signature)` of the caller, prefix for lambda names
    label: String,
    internal: bool,
    scopes: Vec<String>,
    owner: Option<String>,
    frames: Vec<HashMap<String, ExprValue>>,
}

impl Context {
    fn local(&self, name: &str) -> Option<&ExprValue> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    fn bind(&mut self, name: String, value: ExprValue) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value);
        }
    }

    /// Retarget an existing binding. An assignment made in a nested frame
    /// holds until that frame ends; past it the target depends on control
    /// flow, so the declaring frame forgets what it traced.
    fn assign(&mut self, name: &str, callable: Option<SymbolId>) -> bool {
        let Some(declared) = self.frames.iter().rposition(|frame| frame.contains_key(name)) else {
            return false;
        };
        let innermost = self.frames.len() - 1;
        let Some(local) = self.frames[declared].get_mut(name) else {
            return false;
        };
        if declared == innermost {
            local.callable = callable;
            return true;
        }

        let mut shadow = local.clone();
        local.callable = None;
        shadow.callable = callable;
        self.frames[innermost].insert(name.to_string(), shadow);
        true
    }

    /// Evaluate in a frame of its own: for operands that may not run
    fn conditionally<T>(&mut self, eval: impl FnOnce(&mut Context) -> T) -> T {
        self.frames.push(HashMap::new());
        let value = eval(self);
        self.frames.pop();
        value
    }
}

pub(crate) struct CallResolver<'e, 't> {
    tree: &'e AdaptedTree<'t>,
    table: SymbolTable<'e>,
    path: String,
    using: &'e [String],
    namespace_aliases: &'e [(String, String)],
    created: Vec<Symbol>,
    edges: Vec<PartialEdge>,
    diagnostics: Vec<Diagnostic>,
    lambda_counters: HashMap<String, usize>,
    depth: usize,
}

impl<'e, 't> CallResolver<'e, 't> {
    pub fn new(tree: &'e AdaptedTree<'t>, extraction: &'e Extraction<'t>) -> Self {
        Self {
            tree,
            table: SymbolTable::new(extraction.symbols.iter()),
            path: tree.path().to_string(),
            using: &extraction.using,
            namespace_aliases: &extraction.namespace_aliases,
            created: Vec::new(),
            edges: Vec::new(),
            diagnostics: Vec::new(),
            lambda_counters: HashMap::new(),
            depth: 0,
        }
    }

    pub fn resolve(mut self, extraction: &'e Extraction<'t>) -> ResolvedCalls {
        for body in &extraction.bodies {
            self.resolve_body(body);
        }
        self.resolve_initializers(extraction);

        ResolvedCalls {
            symbols: self.created,
            edges: self.edges,
            diagnostics: self.diagnostics,
        }
    }

    fn resolve_body(&mut self, body: &FunctionBody<'t>) {
        let params: HashMap<String, ExprValue> = body
            .params
            .iter()
            .filter_map(|param| {
                let name = param.name.clone()?;
                Some((name, ExprValue::typed(Some(param.ty.clone()))))
            })
            .collect();

        let mut ctx = Context {
            caller: body.id.clone(),
            label: body.label.clone(),
            internal: body.internal,
            scopes: body.scopes.clone(),
            owner: body.owner.clone(),
            frames: vec![params],
        };

        if let Some(initializers) = body.member_initializers {
            for initializer in self.tree.children(initializers) {
                // `radius(r)` / `Base(x)`: only the arguments are evaluated
                for child in self.tree.children(initializer) {
                    if matches!(child.kind(), "argument_list" | "initializer_list") {
                        self.eval_arguments(child, &mut ctx);
                    }
                }
            }
        }

        self.walk(body.body, &mut ctx);
    }

    /// Calls in global and default member initializers belong to a per-file
    /// pseudo-function, created only when something needs it
    fn resolve_initializers(&mut self, extraction: &Extraction<'t>) {
        if extraction.initializers.is_empty() {
            return;
        }

        let key = format!("{INITIALIZER_NAME}()");
        let id = SymbolId::internal("fn", &key, &self.path);
        let edges_before = self.edges.len();
        let created_before = self.created.len();

        for root in &extraction.initializers {
            let mut ctx = Context {
                caller: id.clone(),
                label: key.clone(),
                internal: true,
                scopes: root.scopes.clone(),
                owner: root.owner.clone(),
                frames: vec![HashMap::new()],
            };
            self.eval(root.node, &mut ctx);
        }

        if self.edges.len() == edges_before && self.created.len() == created_before {
            return;
        }

        let root = self.tree.root();
        let mut info = FunctionInfo::new(FunctionKind::Initializer);
        info.is_definition = true;
        self.created.push(Symbol {
            id,
            name: INITIALIZER_NAME.to_string(),
            qualified_name: INITIALIZER_NAME.to_string(),
            kind: SymbolKind::Function,
            parent: Some(SymbolId::file(&self.path)),
            location: Location {
                file: self.path.clone(),
                line: self.tree.line(root),
                end_line: self.tree.end_line(root),
            },
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Function(info),
        });
    }

    /// Statement-level walk
    fn walk(&mut self, node: Node<'t>, ctx: &mut Context) {
        if !self.enter(node) {
            return;
        }
        self.walk_node(node, ctx);
        self.depth -= 1;
    }

    /// Count one nesting level; past the limit the subtree is recorded as
    /// unsupported and skipped
    fn enter(&mut self, node: Node<'t>) -> bool {
        if self.depth >= MAX_NESTING {
            let line = self.tree.line(node);
            log::debug!("{}:{line}: `{}` nested too deeply, skipped", self.path, node.kind());
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnsupportedConstruct,
                format!("`{}` nested more than {MAX_NESTING} levels deep", node.kind()),
                Some(line),
            ));
            return false;
        }
        self.depth += 1;
        true
    }

    fn walk_node(&mut self, node: Node<'t>, ctx: &mut Context) {
        let kind = match self.tree.kind(node) {
            Ok(kind) => kind,
            Err(err) => {
                log::debug!("{}: {err}, descending", self.path);
                self.walk_children(node, ctx);
                return;
            }
        };

        match kind {
            SemanticKind::CompoundStatement => {
                ctx.frames.push(HashMap::new());
                self.walk_children(node, ctx);
                ctx.frames.pop();
            }
            SemanticKind::Statement if node.kind() == "for_range_loop" => self.walk_range_for(node, ctx),
            // declarations here belong to the enclosing statement's frame
            SemanticKind::Statement if matches!(node.kind(), "condition_clause" | "init_statement") => {
                self.walk_children(node, ctx)
            }
            SemanticKind::Statement if is_straight_line(node.kind()) => self.walk_children(node, ctx),
            SemanticKind::Statement => {
                // `for (int i = 0; ...)` and `if (auto x = ...)` scope their
                // declarations; branches and loop bodies may not run
                ctx.frames.push(HashMap::new());
                self.walk_children(node, ctx);
                ctx.frames.pop();
            }
            SemanticKind::Declaration => self.local_declaration(node, ctx),
            SemanticKind::FunctionDefinition
            | SemanticKind::TypeDefinition
            | SemanticKind::AliasDeclaration
            | SemanticKind::Aggregate(_)
            | SemanticKind::Enum
            | SemanticKind::Comment
            | SemanticKind::Preprocessor => {}
            SemanticKind::CallExpression
            | SemanticKind::Cast
            | SemanticKind::MemberAccess
            | SemanticKind::Lambda
            | SemanticKind::Assignment
            | SemanticKind::Expression
            | SemanticKind::Identifier
            | SemanticKind::QualifiedIdentifier
            | SemanticKind::TemplateFunction
            | SemanticKind::This
            | SemanticKind::Literal => {
                self.eval(node, ctx);
            }
            _ => self.walk_children(node, ctx),
        }
    }

    fn walk_children(&mut self, node: Node<'t>, ctx: &mut Context) {
        for child in self.tree.children(node) {
            self.walk(child, ctx);
        }
    }

    fn walk_range_for(&mut self, node: Node<'t>, ctx: &mut Context) {
        if let Some(range) = self.tree.field(node, "right") {
            self.eval(range, ctx);
        }
        ctx.frames.push(HashMap::new());
        if let Some(base) = base_type(self.tree, node) {
            let shape = walk_declarator(self.tree, base, self.tree.field(node, "declarator"), &[]);
            if let Some(name) = shape.name {
                let ty = (!shape.ty.is_deduced()).then_some(shape.ty);
                ctx.bind(self.tree.text(name).to_string(), ExprValue::typed(ty));
            }
        }
        if let Some(body) = self.tree.field(node, "body") {
            self.walk(body, ctx);
        }
        ctx.frames.pop();
    }

    /// `T a = x, *b;` binds each declarator in the innermost frame
    fn local_declaration(&mut self, node: Node<'t>, ctx: &mut Context) {
        let base = base_type(self.tree, node).unwrap_or_else(|| TypeDescriptor::named("int"));

        for declarator in self.tree.fields(node, "declarator") {
            let (inner, value) = if declarator.kind() == "init_declarator" {
                (self.tree.field(declarator, "declarator"), self.tree.field(declarator, "value"))
            } else {
                (Some(declarator), None)
            };

            let shape = walk_declarator(self.tree, base.clone(), inner, &[]);
            if shape.declares_function() {
                continue;
            }

            let value = match value {
                Some(value) if matches!(value.kind(), "argument_list" | "initializer_list") => {
                    self.eval_arguments(value, ctx);
                    None
                }
                Some(value) => Some(self.eval(value, ctx)),
                None => None,
            };

            let Some(name) = shape.name else {
                continue;
            };
            let ty = if shape.ty.is_deduced() {
                value.as_ref().and_then(|value| value.ty.clone())
            } else {
                Some(shape.ty)
            };
            let callable = value.and_then(|value| value.callable);
            ctx.bind(self.tree.text(name).to_string(), ExprValue { ty, callable });
        }
    }

    fn eval_arguments(&mut self, list: Node<'t>, ctx: &mut Context) -> usize {
        let mut count = 0;
        for argument in self.tree.children(list) {
            if argument.kind() == "comment" {
                continue;
            }
            count += 1;
            self.eval(argument, ctx);
        }
        count
    }

    /// Expression walk: emits edges for nested calls and returns what is
    /// statically known about the value
    fn eval(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        if !self.enter(node) {
            return ExprValue::default();
        }
        let value = self.eval_node(node, ctx);
        self.depth -= 1;
        value
    }

    fn eval_node(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        let kind = match self.tree.kind(node) {
            Ok(kind) => kind,
            Err(err) => {
                log::debug!("{}: {err}, descending", self.path);
                self.eval_children(node, ctx);
                return ExprValue::default();
            }
        };

        match kind {
            SemanticKind::CallExpression => self.call(node, ctx),
            SemanticKind::Cast => self.cast(node, ctx),
            SemanticKind::MemberAccess => self.member_value(node, ctx),
            SemanticKind::Lambda => self.lambda(node, ctx),
            SemanticKind::Assignment => self.assignment(node, ctx),
            SemanticKind::Identifier => self.identifier(self.tree.text(node), ctx),
            SemanticKind::QualifiedIdentifier => self.qualified_value(node, ctx),
            SemanticKind::This => ExprValue::typed(
                ctx.owner
                    .as_ref()
                    .map(|owner| TypeDescriptor::pointer_to(TypeDescriptor::named(owner.clone()))),
            ),
            SemanticKind::Literal => ExprValue::default(),
            SemanticKind::Expression => self.expression(node, ctx),
            SemanticKind::CompoundStatement | SemanticKind::Statement | SemanticKind::Declaration => {
                self.walk(node, ctx);
                ExprValue::default()
            }
            _ => {
                self.eval_children(node, ctx);
                ExprValue::default()
            }
        }
    }

    fn eval_children(&mut self, node: Node<'t>, ctx: &mut Context) -> Option<ExprValue> {
        let mut last = None;
        for child in self.tree.children(node) {
            last = Some(self.eval(child, ctx));
        }
        last
    }

    fn expression(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        match node.kind() {
            "parenthesized_expression" => self.eval_children(node, ctx).unwrap_or_default(),
            "binary_expression" => {
                self.binary_chain(node, ctx);
                ExprValue::default()
            }
            "pointer_expression" => {
                let operator = self
                    .tree
                    .field(node, "operator")
                    .map(|op| self.tree.text(op))
                    .unwrap_or("");
                let Some(argument) = self.tree.field(node, "argument") else {
                    return ExprValue::default();
                };
                let value = self.eval(argument, ctx);
                match operator {
                    "&" => ExprValue {
                        ty: value.ty.map(TypeDescriptor::pointer_to),
                        callable: value.callable,
                    },
                    _ => ExprValue {
                        ty: value
                            .ty
                            .as_ref()
                            .map(|ty| self.table.expand_alias(ty, &ctx.scopes))
                            .and_then(|ty| ty.dereferenced().cloned()),
                        callable: value.callable,
                    },
                }
            }
            "subscript_expression" => {
                let value = self
                    .tree
                    .field(node, "argument")
                    .map(|argument| self.eval(argument, ctx))
                    .unwrap_or_default();
                if let Some(indices) = self.tree.field(node, "indices").or_else(|| self.tree.field(node, "index")) {
                    self.eval(indices, ctx);
                }
                ExprValue::typed(
                    value
                        .ty
                        .as_ref()
                        .map(|ty| self.table.expand_alias(ty, &ctx.scopes))
                        .and_then(|ty| ty.dereferenced().cloned()),
                )
            }
            "new_expression" => {
                let ty = self
                    .tree
                    .field(node, "type")
                    .map(|ty| TypeDescriptor::pointer_to(TypeDescriptor::named(normalize_spelling(self.tree.text(ty)))));
                if let Some(arguments) = self.tree.field(node, "arguments") {
                    self.eval_arguments(arguments, ctx);
                }
                ExprValue::typed(ty)
            }
            "conditional_expression" => {
                if let Some(condition) = self.tree.field(node, "condition") {
                    self.eval(condition, ctx);
                }
                let consequence = match self.tree.field(node, "consequence") {
                    Some(branch) => ctx.conditionally(|ctx| self.eval(branch, ctx)),
                    None => ExprValue::default(),
                };
                if let Some(alternative) = self.tree.field(node, "alternative") {
                    ctx.conditionally(|ctx| self.eval(alternative, ctx));
                }
                consequence
            }
            "comma_expression" => self.eval_children(node, ctx).unwrap_or_default(),
            _ => {
                self.eval_children(node, ctx);
                ExprValue::default()
            }
        }
    }

    /// `a + b + c` nests to the left; operands along the left spine are
    /// evaluated in source order without descending one level per operator
    fn binary_chain(&mut self, node: Node<'t>, ctx: &mut Context) {
        let mut rights = Vec::new();
        let mut leftmost = Some(node);
        while let Some(current) = leftmost.filter(|current| current.kind() == "binary_expression") {
            if let Some(right) = self.tree.field(current, "right") {
                // `&&` / `||` may skip their right operand
                let short_circuit = self
                    .tree
                    .field(current, "operator")
                    .is_some_and(|op| matches!(self.tree.text(op), "&&" | "||" | "and" | "or"));
                rights.push((right, short_circuit));
            }
            leftmost = self.tree.field(current, "left");
        }
        if let Some(left) = leftmost {
            self.eval(left, ctx);
        }
        for (right, short_circuit) in rights.into_iter().rev() {
            if short_circuit {
                ctx.conditionally(|ctx| self.eval(right, ctx));
            } else {
                self.eval(right, ctx);
            }
        }
    }

    /// `static_cast<T>(x)`: not a call; evaluates to `T`
    fn cast(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        if let Some(arguments) = self.tree.field(node, "arguments") {
            self.eval_arguments(arguments, ctx);
        }
        let ty = self
            .tree
            .field(node, "function")
            .and_then(|function| self.tree.field(function, "arguments"))
            .and_then(|list| {
                self.tree
                    .children(list)
                    .into_iter()
                    .find(|child| child.kind() == "type_descriptor")
            })
            .and_then(|descriptor| {
                let base = base_type(self.tree, descriptor)?;
                Some(walk_declarator(self.tree, base, self.tree.field(descriptor, "declarator"), &[]).ty)
            });
        ExprValue::typed(ty)
    }

    fn assignment(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        let value = self
            .tree
            .field(node, "right")
            .map(|right| self.eval(right, ctx))
            .unwrap_or_default();
        let Some(left) = self.tree.field(node, "left") else {
            return value;
        };

        if left.kind() == "identifier" {
            let name = self.tree.text(left);
            // direct assignment retargets a traced function pointer
            if ctx.assign(name, value.callable.clone()) {
                return ctx.local(name).cloned().unwrap_or_default();
            }
        }
        self.eval(left, ctx)
    }

    fn identifier(&mut self, name: &str, ctx: &mut Context) -> ExprValue {
        if let Some(local) = ctx.local(name) {
            return local.clone();
        }
        if let Some(field) = self.owner_field(name, ctx) {
            return field;
        }
        if let Some(variable) = self.table.variable(name, &ctx.scopes) {
            let ty = variable.variable_info().map(|info| info.ty.clone());
            return ExprValue::typed(ty.map(|ty| self.qualify(&ty, &enclosing_scopes(&variable.qualified_name))));
        }

        // a function name used as a value
        for scope in &ctx.scopes {
            let functions = self.table.functions(&join_scope(scope, name));
            if let [only] = functions.as_slice() {
                return ExprValue {
                    ty: None,
                    callable: Some(only.id.clone()),
                };
            }
            if !functions.is_empty() {
                break;
            }
        }
        ExprValue::default()
    }

    /// Field of the enclosing type, for unqualified member use inside methods
    fn owner_field(&self, name: &str, ctx: &Context) -> Option<ExprValue> {
        let owner = self.table.find_type(ctx.owner.as_deref()?)?;
        let owner = self.table.canonical_type(owner);
        let field = self.table.field_of(owner, name)?;
        let ty = field.variable_info()?.ty.clone();
        Some(ExprValue::typed(Some(
            self.qualify(&ty, &enclosing_scopes(&field.qualified_name)),
        )))
    }

    fn qualified_value(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        let written = lookup_name(&normalize_spelling(self.tree.text(node)));
        let name = self.expand_namespace_alias(&written, &ctx.scopes);
        for scope in &ctx.scopes {
            let qualified = join_scope(scope, &name);
            let found = self.table.named(&qualified);
            if let Some(variable) = found.iter().find(|symbol| symbol.kind == SymbolKind::Variable) {
                return ExprValue::typed(variable.variable_info().map(|info| info.ty.clone()));
            }
            let functions: Vec<&Symbol> = found
                .iter()
                .copied()
                .filter(|symbol| symbol.kind == SymbolKind::Function)
                .collect();
            if let [only] = functions.as_slice() {
                return ExprValue {
                    ty: None,
                    callable: Some(only.id.clone()),
                };
            }
        }
        ExprValue::default()
    }

    /// `recv.field` / `recv->field` outside a call
    fn member_value(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        let Some(receiver) = self.tree.field(node, "argument") else {
            return ExprValue::default();
        };
        let arrow = self.is_arrow(node);
        let value = self.eval(receiver, ctx);
        let Some(member) = self.tree.field(node, "field").map(|field| self.tree.text(field).to_string()) else {
            return ExprValue::default();
        };

        let ty = self
            .receiver_type(&value, arrow, ctx)
            .and_then(|ty| self.table.type_of_descriptor(&ty, &ctx.scopes))
            .and_then(|owner| self.table.field_of(owner, &member))
            .and_then(|field| {
                let ty = field.variable_info()?.ty.clone();
                Some(self.qualify(&ty, &enclosing_scopes(&field.qualified_name)))
            });
        ExprValue::typed(ty)
    }

    fn is_arrow(&self, node: Node<'t>) -> bool {
        self.tree
            .field(node, "operator")
            .is_some_and(|op| self.tree.text(op) == "->")
    }

    /// Static type of the object a member is selected from
    fn receiver_type(&self, value: &ExprValue, arrow: bool, ctx: &Context) -> Option<TypeDescriptor> {
        let ty = value.ty.as_ref()?;
        let ty = self.table.expand_alias(ty.without_reference(), &ctx.scopes);
        if arrow {
            let pointee = ty.dereferenced()?;
            Some(self.table.expand_alias(pointee, &ctx.scopes))
        } else {
            Some(ty.without_reference().clone())
        }
    }

    /// Rewrite the named leaf of `ty` to its qualified spelling when it
    /// names a known type visible from `scopes`
    fn qualify(&self, ty: &TypeDescriptor, scopes: &[String]) -> TypeDescriptor {
        match ty {
            TypeDescriptor::Named { name, qualifiers } => match self.table.resolve_type(name, scopes) {
                Some(found) => TypeDescriptor::Named {
                    name: found.qualified_name.clone(),
                    qualifiers: *qualifiers,
                },
                None => ty.clone(),
            },
            TypeDescriptor::Pointer { pointee, qualifiers } => TypeDescriptor::Pointer {
                pointee: Box::new(self.qualify(pointee, scopes)),
                qualifiers: *qualifiers,
            },
            TypeDescriptor::Reference { referent, rvalue } => TypeDescriptor::Reference {
                referent: Box::new(self.qualify(referent, scopes)),
                rvalue: *rvalue,
            },
            other => other.clone(),
        }
    }

    fn call(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        let line = self.tree.line(node);
        let arguments = self.tree.field(node, "arguments");
        let argc = arguments
            .map(|list| {
                self.tree
                    .children(list)
                    .iter()
                    .filter(|argument| argument.kind() != "comment")
                    .count()
            })
            .unwrap_or(0);

        let target = match self.tree.field(node, "function") {
            Some(function) => self.callee(function, argc, ctx),
            None => CallTarget::Unresolved(normalize_spelling(self.tree.text(node))),
        };

        let ty = match &target {
            CallTarget::Resolved(resolution) => resolution.return_type.as_ref().map(|ty| {
                let scopes = self
                    .table
                    .get(&resolution.id)
                    .map(|callee| enclosing_scopes(&callee.qualified_name))
                    .unwrap_or_else(|| ctx.scopes.clone());
                self.qualify(ty, &scopes)
            }),
            _ => None,
        };
        self.emit_call(ctx, target, line);

        if let Some(arguments) = arguments {
            self.eval_arguments(arguments, ctx);
        }
        ExprValue::typed(ty)
    }

    fn callee(&mut self, function: Node<'t>, argc: usize, ctx: &mut Context) -> CallTarget {
        match function.kind() {
            "identifier" => self.identifier_callee(self.tree.text(function), argc, ctx),
            "qualified_identifier" => {
                let written = normalize_spelling(self.tree.text(function));
                self.qualified_callee(&written, argc, ctx)
            }
            "template_function" => match self.tree.field(function, "name") {
                Some(name) => self.callee(name, argc, ctx),
                None => CallTarget::Unresolved(normalize_spelling(self.tree.text(function))),
            },
            "field_expression" => self.member_callee(function, argc, ctx),
            "parenthesized_expression" => match self.tree.children(function).into_iter().next() {
                Some(inner) => self.callee(inner, argc, ctx),
                None => CallTarget::Unresolved(String::new()),
            },
            "pointer_expression" => match self.tree.field(function, "argument") {
                Some(argument) => self.dereferenced_callee(argument, argc, ctx),
                None => CallTarget::Unresolved(normalize_spelling(self.tree.text(function))),
            },
            _ => {
                let spelled = normalize_spelling(self.tree.text(function));
                let value = self.eval(function, ctx);
                self.value_callee(&value, &spelled, argc, ctx)
            }
        }
    }

    /// `(*fp)(x)` calls through the pointer itself; `(*obj)(x)` and
    /// `(*this)(x)` call the pointee's `operator()`
    fn dereferenced_callee(&mut self, argument: Node<'t>, argc: usize, ctx: &mut Context) -> CallTarget {
        let spelled = normalize_spelling(self.tree.text(argument));
        let value = match argument.kind() {
            // names carry no calls, so looking one up twice emits nothing
            "identifier" => self.identifier(self.tree.text(argument), ctx),
            _ => self.eval(argument, ctx),
        };

        let pointee = value.ty.as_ref().and_then(|ty| {
            let expanded = self.table.expand_alias(ty, &ctx.scopes);
            if expanded.is_function_pointer() {
                return None;
            }
            expanded.dereferenced().map(|pointee| self.table.expand_alias(pointee, &ctx.scopes))
        });
        match pointee {
            Some(pointee) if value.callable.is_none() => {
                self.value_callee(&ExprValue::typed(Some(pointee)), &spelled, argc, ctx)
            }
            _ if argument.kind() == "identifier" => self.callee(argument, argc, ctx),
            _ => self.value_callee(&value, &spelled, argc, ctx),
        }
    }

    /// Call through a value: a bound function, a function pointer or a functor
    fn value_callee(&mut self, value: &ExprValue, spelled: &str, argc: usize, ctx: &Context) -> CallTarget {
        if let Some(id) = &value.callable {
            return CallTarget::Resolved(Resolution {
                id: id.clone(),
                confidence: Confidence::Exact,
                return_type: self.table.get(id).and_then(|symbol| {
                    symbol.function_info().and_then(|info| info.return_type.clone())
                }),
            });
        }
        let Some(ty) = &value.ty else {
            return CallTarget::Unresolved(spelled.to_string());
        };
        let expanded = self.table.expand_alias(ty, &ctx.scopes);
        if expanded.is_function_pointer() {
            return CallTarget::Unresolved(spelled.to_string());
        }
        let functor = self
            .table
            .type_of_descriptor(&expanded, &ctx.scopes)
            .map(|ty| self.table.methods_of(ty, "operator()"))
            .and_then(|operators| SymbolTable::select(&operators, argc));
        match functor {
            Some(resolution) => CallTarget::Resolved(resolution),
            None => CallTarget::Unresolved(spelled.to_string()),
        }
    }

    fn identifier_callee(&mut self, name: &str, argc: usize, ctx: &mut Context) -> CallTarget {
        if let Some(local) = ctx.local(name).cloned() {
            return self.value_callee(&local, name, argc, ctx);
        }

        if let Some(field) = self.owner_field(name, ctx) {
            if field.ty.as_ref().is_some_and(|ty| self.table.expand_alias(ty, &ctx.scopes).is_function_pointer()) {
                return CallTarget::Unresolved(name.to_string());
            }
        }
        if let Some(variable) = self.table.variable(name, &ctx.scopes) {
            let ty = variable.variable_info().map(|info| info.ty.clone());
            let value = ExprValue::typed(ty);
            return self.value_callee(&value, name, argc, ctx);
        }

        match self
            .table
            .lookup_free(name, &ctx.scopes, ctx.owner.as_deref(), self.using, argc)
        {
            Some(resolution) => CallTarget::Resolved(resolution),
            None => CallTarget::Pending(PendingLookup::Free {
                name: name.to_string(),
                scopes: ctx.scopes.clone(),
                owner: ctx.owner.clone(),
                using: self.using.to_vec(),
                arity: argc,
            }),
        }
    }

    fn qualified_callee(&mut self, written: &str, argc: usize, ctx: &Context) -> CallTarget {
        let scopes = if written.starts_with("::") {
            vec![String::new()]
        } else {
            ctx.scopes.clone()
        };
        let name = self.expand_namespace_alias(written.trim_start_matches("::"), &scopes);
        if name.starts_with("std::") {
            return CallTarget::Unresolved(name);
        }
        match self.table.lookup_qualified(&name, &scopes, argc) {
            Some(resolution) => CallTarget::Resolved(resolution),
            None => CallTarget::Pending(PendingLookup::Qualified {
                name,
                scopes,
                arity: argc,
            }),
        }
    }

    /// `fs::copy` through `namespace fs = std::filesystem;` is `std::filesystem::copy`
    fn expand_namespace_alias(&self, name: &str, scopes: &[String]) -> String {
        let Some((head, rest)) = name.split_once("::") else {
            return name.to_string();
        };
        for scope in scopes {
            let alias = join_scope(scope, head);
            if let Some((_, target)) = self.namespace_aliases.iter().find(|(known, _)| *known == alias) {
                return format!("{target}::{rest}");
            }
        }
        name.to_string()
    }

    fn member_callee(&mut self, function: Node<'t>, argc: usize, ctx: &mut Context) -> CallTarget {
        let member = self
            .tree
            .field(function, "field")
            .map(|field| crate::descriptor::strip_template_args(&normalize_spelling(self.tree.text(field))))
            .unwrap_or_default();
        let Some(receiver) = self.tree.field(function, "argument") else {
            return CallTarget::Unresolved(member);
        };
        let arrow = self.is_arrow(function);
        let value = self.eval(receiver, ctx);

        let Some(ty) = self.receiver_type(&value, arrow, ctx) else {
            log::debug!("{}: receiver of `{member}` has no known type", self.path);
            return CallTarget::Unresolved(member);
        };
        let Some(spelled) = ty.as_named().map(str::to_string) else {
            return CallTarget::Unresolved(member);
        };
        let type_name = lookup_name(&spelled);
        if is_builtin_type(&spelled) {
            return CallTarget::Unresolved(format!("{type_name}::{member}"));
        }

        match self.table.type_of_descriptor(&ty, &ctx.scopes) {
            Some(owner) => {
                if let Some(resolution) = self.table.lookup_member(&[owner.qualified_name.clone()], &member, argc) {
                    return CallTarget::Resolved(resolution);
                }
                if let Some(field) = self.table.field_of(owner, &member) {
                    // `ops.add(1, 2)` through a function-pointer field
                    let ty = field.variable_info().map(|info| info.ty.clone());
                    let spelled = format!("{}::{member}", owner.qualified_name);
                    return self.value_callee(&ExprValue::typed(ty), &spelled, argc, ctx);
                }
                CallTarget::Pending(PendingLookup::Member {
                    receiver: vec![owner.qualified_name.clone()],
                    name: member,
                    arity: argc,
                })
            }
            None => CallTarget::Pending(PendingLookup::Member {
                receiver: ctx
                    .scopes
                    .iter()
                    .map(|scope| join_scope(scope, &type_name))
                    .collect(),
                name: member,
                arity: argc,
            }),
        }
    }

    fn lambda(&mut self, node: Node<'t>, ctx: &mut Context) -> ExprValue {
        let counter = self.lambda_counters.entry(ctx.label.clone()).or_insert(0);
        *counter += 1;
        let name = format!("<lambda #{counter}>");
        let qualified = join_scope(&ctx.label, &name);

        let (params, variadic) = self
            .tree
            .field(node, "declarator")
            .and_then(|declarator| self.tree.field(declarator, "parameters"))
            .map(|list| parse_parameters(self.tree, list))
            .unwrap_or_default();

        let mut info = FunctionInfo::new(FunctionKind::Lambda);
        info.params = params.clone();
        info.is_variadic = variadic;
        info.is_definition = true;
        let key = format!("{qualified}{}", info.signature());
        let id = if ctx.internal {
            SymbolId::internal("fn", &key, &self.path)
        } else {
            SymbolId::new("fn", &key)
        };

        self.created.push(Symbol {
            id: id.clone(),
            name,
            qualified_name: qualified,
            kind: SymbolKind::Function,
            parent: Some(ctx.caller.clone()),
            location: Location {
                file: self.path.clone(),
                line: self.tree.line(node),
                end_line: self.tree.end_line(node),
            },
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Function(info),
        });

        if let Some(body) = self.tree.field(node, "body") {
            // captures see the enclosing frames
            let mut inner = ctx.clone();
            inner.caller = id.clone();
            inner.label = key;
            inner.frames.push(
                params
                    .into_iter()
                    .filter_map(|param| Some((param.name?, ExprValue::typed(Some(param.ty)))))
                    .collect(),
            );
            self.walk(body, &mut inner);
        }

        ExprValue {
            ty: None,
            callable: Some(id),
        }
    }

    fn emit_call(&mut self, ctx: &Context, target: CallTarget, line: usize) {
        let (confidence, target) = match target {
            CallTarget::Resolved(resolution) => {
                if resolution.confidence == Confidence::BestEffort {
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::AmbiguousResolution,
                        format!("call from `{}` resolved best-effort to `{}`", ctx.caller, resolution.id),
                        Some(line),
                    ));
                }
                (resolution.confidence, EdgeTarget::Resolved(resolution.id))
            }
            // settled by the assembler
            CallTarget::Pending(lookup) => (Confidence::Unresolved, EdgeTarget::Pending(lookup)),
            CallTarget::Unresolved(name) => {
                log::debug!("{}:{line}: unresolved call `{name}`", self.path);
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedSymbol,
                    format!("unresolved call to `{name}` from `{}`", ctx.caller),
                    Some(line),
                ));
                (Confidence::Unresolved, EdgeTarget::Unresolved(name))
            }
        };

        self.edges.push(PartialEdge {
            source: ctx.caller.clone(),
            relation: Relation::Calls { confidence, line },
            target,
        });
    }
}

/// Statements that neither declare nor branch run in the enclosing frame
fn is_straight_line(kind: &str) -> bool {
    matches!(
        kind,
        "expression_statement"
            | "return_statement"
            | "break_statement"
            | "continue_statement"
            | "goto_statement"
            | "throw_statement"
            | "co_return_statement"
            | "co_yield_statement"
    )
}
