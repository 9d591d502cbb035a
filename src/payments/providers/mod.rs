pub mod jmf;
pub mod luxtak;
pub mod nuvei;
pub mod paypal;
pub mod paysolutions;
pub mod praxis;
pub mod smilepayz;
pub mod swiftgoldpay;
pub mod zota;

pub use jmf::JmfProvider;
pub use luxtak::LuxtakProvider;
pub use nuvei::{NuveiConnectProvider, NuveiHostedProvider};
pub use paypal::PaypalProvider;
pub use paysolutions::PaysolutionsProvider;
pub use praxis::PraxisProvider;
pub use smilepayz::SmilepayzProvider;
pub use swiftgoldpay::SwiftGoldPayProvider;
pub use zota::ZotaProvider;
