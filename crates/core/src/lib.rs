pub mod amount;
pub mod model;
pub mod reconcile;

pub use amount::{round2, to_amount};
pub use model::{
    ExtractionResult, LineItem, MathAnnotation, MathStatus, PaymentInfo, VendorMetadata,
};
pub use reconcile::{implied_subtotal, reconcile};
