pub mod ast;
pub mod display;
pub mod error;
pub mod hierarchy;
pub mod id;
pub mod member;
pub mod source;
pub mod types;
pub mod unit;

// Re-export commonly used types
pub use ast::{BinaryOp, Block, Call, Expr, Lambda, Literal, Local, MethodRef, Param, Stmt, StmtKind, UnaryOp};
pub use error::CoreError;
pub use hierarchy::TypeHierarchy;
pub use id::{FieldId, MethodId, TypeId};
pub use member::{Attribute, AttributeArg, FieldDef, MethodDef, MethodFlags, TypeDef};
pub use source::{SourceMap, SourceProvider, SourceSpan};
pub use types::{PrimitiveType, TypeKind, TypeRef, Visibility};
pub use unit::Unit;
