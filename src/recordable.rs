/*!
The `Recordable` trait: types that can produce a snapshot worth handing to a KPI sink for later
analysis, decoupled from how that snapshot is serialized.
*/

/// Generates a `RecordType` snapshot of `self`'s current state.
pub trait Recordable<RecordType> {
    fn record(&self) -> RecordType;
}
