// Parameter/result binder.
//
// - params: call arguments -> ParamObject -> positional values for the driver
// - results: ResultSet -> MappedResult -> typed values

mod params;
mod results;

pub use params::{BoundSql, ParamMap, ParamNameResolver, ParamObject, bind};
pub use results::{FromValue, MappedResult, map_result};
pub(crate) use results::{ensure_materializable, first_column, single_row};
