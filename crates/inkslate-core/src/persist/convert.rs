//! Replacement of PDF pages and vector images by embedded PNG pixmaps.

use super::{PersistError, PersistResult};
use crate::items::{ImageFormat, ItemKind, PixmapItem, ResourceRef};
use crate::scene::Scene;
use kurbo::Size;
use std::path::Path;

/// Straight RGBA8 pixels, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// What to rasterize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterSource<'a> {
    /// One page of a PDF file, numbered from 1.
    PdfPage { path: &'a Path, page: u32 },
    VectorImage { path: &'a Path },
}

/// Renders documents the library cannot draw itself.
pub trait Rasterizer {
    /// Render `source` at `size` pixels.
    fn rasterize(&self, source: RasterSource<'_>, size: Size) -> PersistResult<RasterImage>;
}

/// Item kind a conversion pass replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionTarget {
    PdfPages,
    VectorImages,
}

/// Encode RGBA8 pixels as PNG.
pub fn encode_png(image: &RasterImage) -> PersistResult<Vec<u8>> {
    let expected = image.width as usize * image.height as usize * 4;
    if image.rgba.len() != expected {
        return Err(PersistError::Raster(format!(
            "expected {} bytes for {}x{} RGBA, got {}",
            expected,
            image.width,
            image.height,
            image.rgba.len()
        )));
    }

    let mut data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut data, image.width, image.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&image.rgba)?;
        writer.finish()?;
    }
    Ok(data)
}

/// Convert every matching item of `scene` in place. Items whose resource is
/// missing or fails to render keep their kind.
///
/// Returns the number of converted items.
pub fn convert_scene(scene: &mut Scene, target: ConversionTarget, rasterizer: &dyn Rasterizer) -> usize {
    let mut converted = 0;
    scene.for_each_item_mut(&mut |item| {
        let size = item.geometry.size();
        let rendered = {
            let source = match (&item.kind, target) {
                (ItemKind::PdfPage(pdf), ConversionTarget::PdfPages) => local_path(pdf.resource.as_ref())
                    .map(|path| RasterSource::PdfPage { path, page: pdf.page }),
                (ItemKind::VectorImage(image), ConversionTarget::VectorImages) => {
                    local_path(image.resource.as_ref()).map(|path| RasterSource::VectorImage { path })
                }
                _ => return,
            };
            let Some(source) = source else {
                log::debug!("Skipping {} {} without a local resource", item.kind.name(), item.id());
                return;
            };
            rasterizer.rasterize(source, size).and_then(|image| encode_png(&image))
        };

        match rendered {
            Ok(png) => {
                item.kind = ItemKind::Pixmap(PixmapItem {
                    resource: Some(ResourceRef::embedded(ImageFormat::Png, &png)),
                    background: false,
                });
                converted += 1;
            }
            Err(e) => log::warn!("Could not convert {} {}: {}", item.kind.name(), item.id(), e),
        }
    });
    converted
}

fn local_path(resource: Option<&ResourceRef>) -> Option<&Path> {
    resource.filter(|r| !r.is_missing()).and_then(ResourceRef::path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Item, PdfPageItem, VectorImageItem};
    use kurbo::Rect;
    use std::cell::RefCell;

    /// Solid-color renderer recording what it was asked for.
    #[derive(Default)]
    struct SolidRasterizer {
        calls: RefCell<Vec<String>>,
    }

    impl Rasterizer for SolidRasterizer {
        fn rasterize(&self, source: RasterSource<'_>, size: Size) -> PersistResult<RasterImage> {
            let label = match source {
                RasterSource::PdfPage { path, page } => format!("{}#{}", path.display(), page),
                RasterSource::VectorImage { path } => path.display().to_string(),
            };
            self.calls.borrow_mut().push(label);
            let (width, height) = (size.width.max(1.0) as u32, size.height.max(1.0) as u32);
            Ok(RasterImage {
                width,
                height,
                rgba: vec![0x80; (width * height * 4) as usize],
            })
        }
    }

    #[test]
    fn test_encode_png_signature() {
        let image = RasterImage {
            width: 2,
            height: 1,
            rgba: vec![255; 8],
        };
        let png = encode_png(&image).unwrap();
        assert_eq!(ImageFormat::from_magic_bytes(&png), Some(ImageFormat::Png));
    }

    #[test]
    fn test_encode_png_rejects_short_buffer() {
        let image = RasterImage {
            width: 4,
            height: 4,
            rgba: vec![0; 3],
        };
        assert!(matches!(encode_png(&image), Err(PersistError::Raster(_))));
    }

    #[test]
    fn test_convert_pdf_pages_only() {
        let mut scene = Scene::new();
        let pdf = Item::new(ItemKind::PdfPage(PdfPageItem {
            resource: Some(ResourceRef::file("/doc/objects/a.pdf")),
            page: 3,
        }))
        .with_geometry(Rect::new(0.0, 0.0, 4.0, 3.0));
        let pdf_id = pdf.id();
        scene.add_item(pdf);
        scene.add_item(Item::new(ItemKind::VectorImage(VectorImageItem {
            resource: Some(ResourceRef::file("/doc/images/b.svg")),
        })));

        let rasterizer = SolidRasterizer::default();
        assert_eq!(convert_scene(&mut scene, ConversionTarget::PdfPages, &rasterizer), 1);
        assert_eq!(*rasterizer.calls.borrow(), vec!["/doc/objects/a.pdf#3".to_string()]);

        let converted = scene.find_item(pdf_id).unwrap();
        assert!(matches!(
            &converted.kind,
            ItemKind::Pixmap(PixmapItem { resource: Some(ResourceRef::Embedded { format: ImageFormat::Png, .. }), .. })
        ));
        assert_eq!(converted.geometry, Rect::new(0.0, 0.0, 4.0, 3.0));
    }

    #[test]
    fn test_missing_resources_are_skipped() {
        let mut scene = Scene::new();
        scene.add_item(Item::new(ItemKind::VectorImage(VectorImageItem {
            resource: Some(ResourceRef::File {
                path: "/doc/images/gone.svg".into(),
                missing: true,
            }),
        })));
        scene.add_item(Item::new(ItemKind::VectorImage(VectorImageItem { resource: None })));

        let rasterizer = SolidRasterizer::default();
        assert_eq!(convert_scene(&mut scene, ConversionTarget::VectorImages, &rasterizer), 0);
        assert!(rasterizer.calls.borrow().is_empty());
    }
}
