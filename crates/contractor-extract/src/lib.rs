pub mod builder;
pub mod cache;
pub mod config;
pub mod contract;
pub mod diagnostics;
pub mod error;
pub mod extractor;
pub mod inherit;
pub mod inject;
pub mod legacy;
pub mod linear;
pub mod negate;
pub mod registry;
pub mod rewrite;
pub mod scanner;
pub mod source_text;
pub mod specialize;

// Re-export commonly used types
pub use cache::{ContractCache, ContractKind};
pub use config::ExtractorConfig;
pub use contract::{Invariant, MethodContract, Postcondition, Precondition, ThrownException, TypeContract};
pub use diagnostics::ExtractionDiagnostic;
pub use error::ExtractError;
pub use extractor::{ContractExtractor, Member, MemberFailure, MethodExtraction, TypeExtraction, UnitExtraction};
pub use inherit::{Ancestor, ContractProvider, Inheritance};
pub use inject::{inject_invariant_method, ContractInjector};
pub use registry::{declare_contract_class, ContractMethod, ContractRegistry};
