// Statement registry: operation ids, mapped statements, and `#{}` template handling.

mod registry;
mod statement;
mod template;

pub use registry::{RegistryBuilder, StatementRegistry};
pub use statement::{MappedStatement, MappedStatementBuilder, OperationId};
pub use template::{ParameterShape, ParsedTemplate, parse_template};
