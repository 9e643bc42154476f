//! Path and prefix classification.
//!
//! Raw request paths are parsed into typed [`Location`] descriptors before
//! any policy or store access happens.  Classification is pure and total:
//! malformed input returns `None`, it never panics.
//!
//! Only two root namespaces exist, `galleries/` and `branding/`.  Anything
//! containing `..` or a backslash is rejected outright.

use std::fmt;

/// Image size variant within a gallery subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Originals,
    Medium,
    Thumbnails,
}

impl Variant {
    /// Parse a path segment into a variant.
    pub fn parse(segment: &str) -> Option<Variant> {
        match segment {
            "originals" => Some(Variant::Originals),
            "medium" => Some(Variant::Medium),
            "thumbnails" => Some(Variant::Thumbnails),
            _ => None,
        }
    }

    /// The folder name of this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Originals => "originals",
            Variant::Medium => "medium",
            Variant::Thumbnails => "thumbnails",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified storage location.
///
/// The first two variants address single objects, the remaining three
/// address key prefixes.  Read prefixes are list-only; manage and branding
/// prefixes exist solely to scope mutating operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A photo object inside one gallery variant folder.
    GalleryFile {
        gallery_id: String,
        variant: Variant,
        filename: String,
    },
    /// A brand asset (logo, watermark) owned by one subject.
    BrandingFile { owner_id: String, filename: String },
    /// A single gallery variant folder, listable.
    GalleryReadPrefix {
        gallery_id: String,
        variant: Variant,
    },
    /// The whole gallery subtree, for bulk mutation only.
    GalleryManagePrefix { gallery_id: String },
    /// One subject's branding folder, for bulk mutation only.
    BrandingPrefix { owner_id: String },
}

impl Location {
    /// The canonical blob store key for an object location, or `None` for
    /// prefix locations.
    pub fn object_key(&self) -> Option<String> {
        match self {
            Location::GalleryFile {
                gallery_id,
                variant,
                filename,
            } => Some(format!("galleries/{gallery_id}/{variant}/{filename}")),
            Location::BrandingFile { owner_id, filename } => {
                Some(format!("branding/{owner_id}/{filename}"))
            }
            _ => None,
        }
    }

    /// The canonical blob store key prefix (with trailing slash) for a
    /// prefix location, or `None` for object locations.
    pub fn prefix_key(&self) -> Option<String> {
        match self {
            Location::GalleryReadPrefix {
                gallery_id,
                variant,
            } => Some(format!("galleries/{gallery_id}/{variant}/")),
            Location::GalleryManagePrefix { gallery_id } => {
                Some(format!("galleries/{gallery_id}/"))
            }
            Location::BrandingPrefix { owner_id } => Some(format!("branding/{owner_id}/")),
            _ => None,
        }
    }

    /// The gallery ID this location belongs to, if any.
    pub fn gallery_id(&self) -> Option<&str> {
        match self {
            Location::GalleryFile { gallery_id, .. }
            | Location::GalleryReadPrefix { gallery_id, .. }
            | Location::GalleryManagePrefix { gallery_id } => Some(gallery_id),
            _ => None,
        }
    }

    /// The branding owner this location belongs to, if any.
    pub fn branding_owner(&self) -> Option<&str> {
        match self {
            Location::BrandingFile { owner_id, .. } | Location::BrandingPrefix { owner_id } => {
                Some(owner_id)
            }
            _ => None,
        }
    }
}

/// Strip leading slashes and reject traversal characters.
///
/// Returns `None` when the path can never be a valid location.
fn normalize(raw: &str) -> Option<&str> {
    let trimmed = raw.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.contains("..") || trimmed.contains('\\') {
        return None;
    }
    Some(trimmed)
}

/// An identifier segment must be non-empty and must not itself be a path.
fn valid_id(segment: &str) -> bool {
    !segment.is_empty()
}

/// Classify a raw object path into a file location.
///
/// Accepted shapes:
/// - `galleries/{id}/{originals|medium|thumbnails}/{name...}`
/// - `branding/{ownerId}/{name...}`
pub fn classify_path(raw: &str) -> Option<Location> {
    let path = normalize(raw)?;
    let mut segments = path.splitn(4, '/');

    match segments.next()? {
        "galleries" => {
            let gallery_id = segments.next().filter(|s| valid_id(s))?.to_string();
            let variant = Variant::parse(segments.next()?)?;
            let filename = segments.next().filter(|s| !s.is_empty())?.to_string();
            Some(Location::GalleryFile {
                gallery_id,
                variant,
                filename,
            })
        }
        "branding" => {
            let owner_id = segments.next().filter(|s| valid_id(s))?.to_string();
            // Re-join the remaining segments: branding names may nest.
            let filename = match (segments.next(), segments.next()) {
                (Some(a), Some(b)) if !a.is_empty() => format!("{a}/{b}"),
                (Some(a), None) if !a.is_empty() => a.to_string(),
                _ => return None,
            };
            Some(Location::BrandingFile { owner_id, filename })
        }
        _ => None,
    }
}

/// Classify a raw list/bulk prefix string into a prefix location.
///
/// Accepted shapes (trailing slash optional):
/// - `galleries/{id}/{variant}/` -- list-only variant folder
/// - `galleries/{id}/` -- whole gallery subtree, mutating-only
/// - `branding/{ownerId}/` -- branding folder, mutating-only
pub fn classify_prefix(raw: &str) -> Option<Location> {
    let prefix = normalize(raw)?;
    let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
    let segments: Vec<&str> = prefix.split('/').collect();

    match segments.as_slice() {
        ["galleries", gallery_id] if valid_id(gallery_id) => Some(Location::GalleryManagePrefix {
            gallery_id: (*gallery_id).to_string(),
        }),
        ["galleries", gallery_id, variant] if valid_id(gallery_id) => {
            Some(Location::GalleryReadPrefix {
                gallery_id: (*gallery_id).to_string(),
                variant: Variant::parse(variant)?,
            })
        }
        ["branding", owner_id] if valid_id(owner_id) => Some(Location::BrandingPrefix {
            owner_id: (*owner_id).to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_gallery_file() {
        let loc = classify_path("galleries/g1/originals/a.jpg").unwrap();
        assert_eq!(
            loc,
            Location::GalleryFile {
                gallery_id: "g1".into(),
                variant: Variant::Originals,
                filename: "a.jpg".into(),
            }
        );
        assert_eq!(loc.object_key().unwrap(), "galleries/g1/originals/a.jpg");
    }

    #[test]
    fn test_classify_gallery_file_nested_name() {
        let loc = classify_path("galleries/g1/medium/sub/dir/b.png").unwrap();
        assert_eq!(
            loc,
            Location::GalleryFile {
                gallery_id: "g1".into(),
                variant: Variant::Medium,
                filename: "sub/dir/b.png".into(),
            }
        );
    }

    #[test]
    fn test_classify_branding_file() {
        let loc = classify_path("branding/user-7/logo.png").unwrap();
        assert_eq!(
            loc,
            Location::BrandingFile {
                owner_id: "user-7".into(),
                filename: "logo.png".into(),
            }
        );
        assert_eq!(loc.object_key().unwrap(), "branding/user-7/logo.png");
    }

    #[test]
    fn test_leading_slashes_are_stripped() {
        assert!(classify_path("/galleries/g1/thumbnails/t.jpg").is_some());
        assert!(classify_path("//galleries/g1/thumbnails/t.jpg").is_some());
    }

    #[test]
    fn test_traversal_and_backslash_rejected() {
        assert_eq!(classify_path("galleries/g1/originals/../secret.jpg"), None);
        assert_eq!(classify_path("galleries/../branding/u/x.png"), None);
        assert_eq!(classify_path("galleries\\g1\\originals\\a.jpg"), None);
        assert_eq!(classify_prefix("galleries/../"), None);
        assert_eq!(classify_prefix("galleries\\g1"), None);
    }

    #[test]
    fn test_unknown_shapes_rejected() {
        assert_eq!(classify_path(""), None);
        assert_eq!(classify_path("galleries"), None);
        assert_eq!(classify_path("galleries/g1"), None);
        assert_eq!(classify_path("galleries/g1/bogus/a.jpg"), None);
        assert_eq!(classify_path("galleries//originals/a.jpg"), None);
        assert_eq!(classify_path("branding/u1"), None);
        assert_eq!(classify_path("secrets/x.txt"), None);
        assert_eq!(classify_path("galleries/g1/originals/"), None);
    }

    #[test]
    fn test_classify_prefix_shapes() {
        assert_eq!(
            classify_prefix("galleries/g1/originals/").unwrap(),
            Location::GalleryReadPrefix {
                gallery_id: "g1".into(),
                variant: Variant::Originals,
            }
        );
        assert_eq!(
            classify_prefix("galleries/g1/").unwrap(),
            Location::GalleryManagePrefix {
                gallery_id: "g1".into(),
            }
        );
        assert_eq!(
            classify_prefix("branding/u1").unwrap(),
            Location::BrandingPrefix {
                owner_id: "u1".into(),
            }
        );
    }

    #[test]
    fn test_classify_prefix_rejects_objects_and_junk() {
        assert_eq!(classify_prefix("galleries/g1/originals/a.jpg"), None);
        assert_eq!(classify_prefix("galleries/"), None);
        assert_eq!(classify_prefix("branding/"), None);
        assert_eq!(classify_prefix("galleries/g1/bogus/"), None);
        assert_eq!(classify_prefix(""), None);
    }

    #[test]
    fn test_prefix_keys() {
        assert_eq!(
            classify_prefix("galleries/g1/").unwrap().prefix_key().unwrap(),
            "galleries/g1/"
        );
        assert_eq!(
            classify_prefix("branding/u1/").unwrap().prefix_key().unwrap(),
            "branding/u1/"
        );
    }
}
