// Method invocation router
//
// A MapperProxy borrows a session and turns method calls into statement calls
// through a per-interface cache of invokers.

mod cache;
mod interface;
mod invoker;
mod mapper;

pub use cache::MethodCache;
pub use interface::{
    DefaultMethod, MapperInterface, MapperInterfaceBuilder, MapperRegistry, MethodDecl,
    MethodSignature,
};
pub use invoker::{MapperMethod, MapperMethodInvoker};
pub use mapper::{Mapper, MapperProxy};
