//! Arena syntax tree
//!
//! Nodes live in a flat arena and address each other by index; the ordered
//! tree shape is encoded as first-child/next-sibling links. The backend
//! never creates or destroys nodes, it only reads them (value locations are
//! tracked on the backend's side, keyed by `NodeId`).

use cmm_common::{FunctionSignature, NodeId, PrimitiveType, TypeDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Unary `+`
    Plus,
    /// Arithmetic negation
    Minus,
    /// Logical negation (integer operands only)
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Operators producing an integer 0/1 result on either operand file
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Short-circuit combinators, lowered as control flow, never as values
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Float(f32),
    /// String literals appear only as `write` arguments
    Str(String),
}

/// Node kinds of the type-annotated tree handed to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Root; children are variable declaration lists and function
    /// definitions in source order
    Program,
    /// Children: one `VarDecl` per declared name
    VarDeclList,
    /// A single declared variable; an optional `Const` child is the
    /// initializer
    VarDecl { name: String, ty: TypeDescriptor },
    /// Children: `ParamList`, `Block`
    FuncDecl {
        name: String,
        signature: FunctionSignature,
    },
    ParamList,
    Param { name: String, ty: TypeDescriptor },
    /// Children: `VarDeclList` and `StmtList` nodes in order
    Block,
    StmtList,
    Const(Constant),
    /// Children: subscript expressions, one per indexed dimension
    Ident(String),
    /// One child: the operand
    Unary(UnaryOp),
    /// Two children: left and right operands
    Binary(BinaryOp),
    /// Children: lvalue `Ident`, rvalue expression
    Assign,
    /// Children: `Ident` naming the callee, `ArgList`
    Call,
    ArgList,
    /// Children: condition, then-statement, else-statement (`Empty` when the
    /// `else` branch is absent)
    If,
    /// Children: condition, body
    While,
    /// Children: init `ExprList`, condition `ExprList`, step `ExprList`, body
    For,
    /// Comma-separated expression list in a `for` clause; may be empty
    ExprList,
    /// One optional child: the returned expression
    Return,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Resolved primitive type, set by semantic analysis on every
    /// value-producing node
    pub ty: Option<PrimitiveType>,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

/// Arena of syntax-tree nodes
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node {
            kind,
            ty: None,
            first_child: None,
            next_sibling: None,
        });
        id
    }

    /// Add a node with its resolved primitive type already set
    pub fn add_typed(&mut self, kind: NodeKind, ty: PrimitiveType) -> NodeId {
        let id = self.add(kind);
        self.nodes[id as usize].ty = Some(ty);
        id
    }

    pub fn int_const(&mut self, value: i32) -> NodeId {
        self.add_typed(NodeKind::Const(Constant::Int(value)), PrimitiveType::Int)
    }

    pub fn float_const(&mut self, value: f32) -> NodeId {
        self.add_typed(NodeKind::Const(Constant::Float(value)), PrimitiveType::Float)
    }

    pub fn ident(&mut self, name: &str, ty: PrimitiveType) -> NodeId {
        self.add_typed(NodeKind::Ident(name.to_string()), ty)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    pub fn set_type(&mut self, id: NodeId, ty: PrimitiveType) {
        self.nodes[id as usize].ty = Some(ty);
    }

    /// Resolved type of a value-producing node; defaults to int for nodes
    /// semantic analysis left untyped (e.g. statement nodes)
    pub fn type_of(&self, id: NodeId) -> PrimitiveType {
        self.node(id).ty.unwrap_or(PrimitiveType::Int)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Wire `children` under `parent` in order, replacing existing links
    pub fn set_children(&mut self, parent: NodeId, children: &[NodeId]) {
        self.nodes[parent as usize].first_child = children.first().copied();
        for pair in children.windows(2) {
            self.nodes[pair[0] as usize].next_sibling = Some(pair[1]);
        }
        if let Some(&last) = children.last() {
            self.nodes[last as usize].next_sibling = None;
        }
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// The `n`-th child (0-based), walking sibling links
    pub fn child(&self, id: NodeId, n: usize) -> Option<NodeId> {
        self.children(id).nth(n)
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            ast: self,
            next: self.node(id).first_child,
        }
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }
}

/// Iterator over a node's children in sibling order
pub struct Children<'a> {
    ast: &'a Ast,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.ast.node(current).next_sibling;
        Some(current)
    }
}
