//! HTML rendering of the client gallery page.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating, so
//! gallery and file names supplied by the studio are always escaped.
//!
//! | View | Page |
//! |---|---|
//! | `Ready` | Image grid with a download link per image |
//! | `Empty` | "No images yet" notice |
//! | `NotFound` | "Gallery not found" notice |
//! | `Unavailable` | "Try again later" notice (the reason is not shown) |
//!
//! Eager images get `loading="eager"` and `fetchpriority="high"`; the rest
//! get `loading="lazy"`.

use std::path::Path;

use maud::{DOCTYPE, Markup, html};
use thiserror::Error;

use crate::viewer::{GalleryView, Loading, ViewImage};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const CSS: &str = "\
:root { --bg: #faf9f7; --fg: #222; --muted: #777; --gap: 12px; }
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, sans-serif; background: var(--bg); color: var(--fg); }
header.gallery-header { padding: 32px 24px 16px; }
header.gallery-header h1 { margin: 0 0 4px; font-weight: 500; }
header.gallery-header p { margin: 0; color: var(--muted); }
.image-grid { display: grid; gap: var(--gap); padding: 24px; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); }
figure { margin: 0; }
figure img { width: 100%; height: auto; display: block; border-radius: 4px; }
figcaption { display: flex; justify-content: space-between; font-size: 0.85rem; color: var(--muted); padding-top: 4px; }
.notice { max-width: 480px; margin: 20vh auto; text-align: center; }
";

/// Renders the base HTML document structure
fn base_document(title: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta name="robots" content="noindex";
                title { (title) }
                style { (CSS) }
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

fn notice(heading: &str, message: &str) -> Markup {
    html! {
        main.notice {
            h1 { (heading) }
            p { (message) }
        }
    }
}

fn render_image(image: &ViewImage) -> Markup {
    let priority = match image.loading {
        Loading::Eager => Some("high"),
        Loading::Lazy => None,
    };
    html! {
        figure {
            img src=(image.url) alt=(image.name) loading=(image.loading.as_attr()) fetchpriority=[priority];
            figcaption {
                span { (image.name) }
                a href=(image.url) download=(image.name) { "Download" }
            }
        }
    }
}

/// Render the client page for any view state.
pub fn render_gallery_page(view: &GalleryView, studio_name: &str) -> Markup {
    match view {
        GalleryView::Ready { gallery, images } => {
            let content = html! {
                header.gallery-header {
                    h1 { (gallery.name) }
                    p { "For " (gallery.client_name) " · " (images.len()) " photos" }
                }
                main.image-grid {
                    @for image in images {
                        (render_image(image))
                    }
                }
            };
            base_document(&gallery.name, Some("gallery"), content)
        }
        GalleryView::Empty(gallery) => base_document(
            &gallery.name,
            Some("gallery-empty"),
            notice(&gallery.name, "No images have been added to this gallery yet."),
        ),
        GalleryView::NotFound => base_document(
            studio_name,
            Some("not-found"),
            notice(
                "Gallery not found",
                "The gallery you are looking for does not exist or has been removed.",
            ),
        ),
        GalleryView::Unavailable(_) => base_document(
            studio_name,
            Some("unavailable"),
            notice(
                "Gallery unavailable",
                "We could not load this gallery right now. Please try again later.",
            ),
        ),
    }
}

/// Render and write the page to `path`.
pub fn write_gallery_page(view: &GalleryView, studio_name: &str, path: &Path) -> Result<(), RenderError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_gallery_page(view, studio_name).into_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GallerySummary;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn summary(image_count: usize) -> GallerySummary {
        GallerySummary {
            gallery_id: "g1".into(),
            name: "Smith <Wedding>".into(),
            client_name: "Jane".into(),
            client_email: "jane@example.com".into(),
            created_at: Utc::now(),
            image_count,
        }
    }

    fn image(i: usize, loading: Loading) -> ViewImage {
        ViewImage {
            id: Uuid::new_v4(),
            name: format!("{i:02}.jpg"),
            url: format!("memory://galleries/g1/{i:02}.jpg?expires=1"),
            size: 3,
            content_type: "image/jpeg".into(),
            loading,
        }
    }

    fn ready(count: usize) -> GalleryView {
        GalleryView::Ready {
            gallery: summary(count),
            images: (0..count)
                .map(|i| image(i, if i < 6 { Loading::Eager } else { Loading::Lazy }))
                .collect(),
        }
    }

    #[test]
    fn page_includes_doctype_and_escapes_names() {
        let html = render_gallery_page(&ready(1), "Studio").into_string();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Smith &lt;Wedding&gt;"));
        assert!(!html.contains("<Wedding>"));
    }

    #[test]
    fn eager_images_get_high_priority() {
        let html = render_gallery_page(&ready(8), "Studio").into_string();
        assert_eq!(html.matches(r#"loading="eager""#).count(), 6);
        assert_eq!(html.matches(r#"loading="lazy""#).count(), 2);
        assert_eq!(html.matches(r#"fetchpriority="high""#).count(), 6);
    }

    #[test]
    fn each_image_has_download_link() {
        let html = render_gallery_page(&ready(3), "Studio").into_string();
        assert_eq!(html.matches("Download</a>").count(), 3);
        assert!(html.contains(r#"download="00.jpg""#));
    }

    #[test]
    fn distinct_pages_for_non_ready_states() {
        let empty = render_gallery_page(&GalleryView::Empty(summary(0)), "Studio").into_string();
        let missing = render_gallery_page(&GalleryView::NotFound, "Studio").into_string();
        let down = render_gallery_page(&GalleryView::Unavailable("timeout".into()), "Studio").into_string();

        assert!(empty.contains("No images have been added"));
        assert!(missing.contains("Gallery not found"));
        assert!(down.contains("Please try again later"));
        assert!(!down.contains("timeout"));
    }

    #[test]
    fn write_gallery_page_creates_file() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("site/g1.html");
        write_gallery_page(&GalleryView::NotFound, "Studio", &out).unwrap();
        assert!(std::fs::read_to_string(out).unwrap().contains("Gallery not found"));
    }
}
