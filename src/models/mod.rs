pub mod visit;

pub use visit::{DestinationKey, GeoInfo, VisitLog, VisitRecord, VisitRecordInput};
