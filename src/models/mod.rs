pub mod cost;
pub mod subscription;
pub mod tag;

pub use cost::{
    BatchCostRequest, CostEntry, CostQueryParams, EntryKind, MonthlyBreakdownItem,
    ReportCreationResponse, ResourceGroupCostDetails, SubscriptionCostDetails,
};
pub use subscription::AzureSubscription;
pub use tag::{TagDetails, TagFilter, TagOperator};
