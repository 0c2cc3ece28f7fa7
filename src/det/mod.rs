pub mod det_manager;
pub mod hybridization;
pub mod linalg;

use self::det_manager::DetManager;
use self::hybridization::HybridizationAdaptor;

/// Fast-update structure of one color.
pub type Det = DetManager<HybridizationAdaptor>;
