//! Public access policy over classified locations.
//!
//! Anonymous reads are allowed only for single objects; anonymous listing
//! is allowed only for a gallery variant folder.  Manage and branding
//! prefixes never serve anonymous traffic.  Share-token gating on top of
//! this policy lives in [`crate::share`].

use crate::paths::Location;

/// Whether an anonymous `GET` of object bytes may be served for `loc`
/// (before share-token gating).
pub fn can_public_read(loc: &Location) -> bool {
    matches!(
        loc,
        Location::GalleryFile { .. } | Location::BrandingFile { .. }
    )
}

/// Whether an anonymous prefix listing may be served for `loc` (before
/// share-token gating).
pub fn can_public_list(loc: &Location) -> bool {
    matches!(loc, Location::GalleryReadPrefix { .. })
}

/// Whether reads and lists of `loc` are subject to the share-token gate.
///
/// Branding assets are never token-gated.
pub fn share_gated(loc: &Location) -> bool {
    matches!(
        loc,
        Location::GalleryFile { .. } | Location::GalleryReadPrefix { .. }
    )
}
