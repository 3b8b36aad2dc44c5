use serde::Serialize;

/// One entry of the scene catalog. `name` is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scene {
    pub name: String,
    /// OBS `sceneIndex`; the catalog itself is kept in display order.
    pub index: u32,
}
