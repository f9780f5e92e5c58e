use crate::domain::LocationContext;

/// Derive the canonical cache key for a resource in a location context.
///
/// This is the single key-derivation function for the whole workspace: the
/// query layer writes through it and the preloader warms through it, so the
/// two always land on the same entry. A missing pincode maps to the stable
/// token `none`, never to the empty string, so unscoped and location-scoped
/// lookups cannot collide.
pub fn location_key(resource: &str, ctx: &LocationContext) -> String {
    format!(
        "{}:{}:{}",
        resource,
        ctx.pincode.as_deref().unwrap_or("none"),
        ctx.mode().as_str()
    )
}
