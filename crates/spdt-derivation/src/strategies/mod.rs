//! The five configuration strategies.

mod always_resize;
mod best_resource_pair;
mod naive;
mod only_delta_load;
mod resize_when_beneficial;

pub use always_resize::AlwaysResize;
pub use best_resource_pair::BestResourcePair;
pub use naive::Naive;
pub use only_delta_load::OnlyDeltaLoad;
pub use resize_when_beneficial::ResizeWhenBeneficial;
