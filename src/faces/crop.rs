use image::{DynamicImage, GenericImageView};

use crate::vision::FaceAnnotation;

/// Crop rectangle in image pixels; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl CropRect {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle spanned by the first and third bounding-polygon vertices.
    ///
    /// An absent coordinate on the first vertex means 0 and on the third
    /// means the image width or height, as does an absent vertex.
    pub fn from_face(face: &FaceAnnotation, width: u32, height: u32) -> Self {
        let top_left = face.vertex(0);
        let bottom_right = face.vertex(2);

        Self {
            left: top_left.x.unwrap_or(0),
            top: top_left.y.unwrap_or(0),
            right: bottom_right.x.unwrap_or(i64::from(width)),
            bottom: bottom_right.y.unwrap_or(i64::from(height)),
        }
    }

    /// The part of this rectangle inside a `width` x `height` image, as
    /// `(x, y, w, h)`, or `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp_x = |v: i64| v.clamp(0, i64::from(width)) as u32;
        let clamp_y = |v: i64| v.clamp(0, i64::from(height)) as u32;

        let (left, right) = (clamp_x(self.left), clamp_x(self.right));
        let (top, bottom) = (clamp_y(self.top), clamp_y(self.bottom));

        if right <= left || bottom <= top {
            return None;
        }
        Some((left, top, right - left, bottom - top))
    }
}

/// Crop `image` to `rect`, or `None` if the rectangle lies outside it.
pub fn crop(image: &DynamicImage, rect: CropRect) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();
    let (x, y, w, h) = rect.clamp_to(width, height)?;
    Some(image.crop_imm(x, y, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::Vertex;

    fn face(vertices: Vec<Vertex>) -> FaceAnnotation {
        FaceAnnotation::from_vertices(&vertices)
    }

    fn v(x: Option<i64>, y: Option<i64>) -> Vertex {
        Vertex::new(x, y)
    }

    #[test]
    fn test_rect_from_complete_vertices() {
        let face = face(vec![
            v(Some(10), Some(20)),
            v(Some(110), Some(20)),
            v(Some(110), Some(220)),
            v(Some(10), Some(220)),
        ]);
        assert_eq!(CropRect::from_face(&face, 640, 480), CropRect::new(10, 20, 110, 220));
    }

    #[test]
    fn test_rect_ignores_second_and_fourth_vertex() {
        let face = face(vec![v(Some(10), Some(20)), v(None, None), v(Some(110), Some(220)), v(None, None)]);
        assert_eq!(CropRect::from_face(&face, 640, 480), CropRect::new(10, 20, 110, 220));
    }

    #[test]
    fn test_missing_coordinates_default_to_edges() {
        let left_edge = face(vec![v(None, Some(20)), v(None, None), v(Some(110), None), v(None, None)]);
        assert_eq!(CropRect::from_face(&left_edge, 640, 480), CropRect::new(0, 20, 110, 480));

        let right_edge = face(vec![v(Some(5), None), v(None, None), v(None, Some(70)), v(None, None)]);
        assert_eq!(CropRect::from_face(&right_edge, 640, 480), CropRect::new(5, 0, 640, 70));
    }

    #[test]
    fn test_missing_vertices_span_whole_image() {
        assert_eq!(CropRect::from_face(&face(vec![]), 640, 480), CropRect::new(0, 0, 640, 480));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(CropRect::new(10, 20, 110, 220).clamp_to(640, 480), Some((10, 20, 100, 200)));
        assert_eq!(CropRect::new(-5, -5, 700, 500).clamp_to(640, 480), Some((0, 0, 640, 480)));
        assert_eq!(CropRect::new(50, 50, 50, 80).clamp_to(640, 480), None);
        assert_eq!(CropRect::new(700, 10, 800, 80).clamp_to(640, 480), None);
    }

    #[test]
    fn test_crop_dimensions() {
        let image = DynamicImage::new_rgb8(300, 300);
        let cropped = crop(&image, CropRect::new(10, 20, 110, 220)).unwrap();
        assert_eq!(cropped.dimensions(), (100, 200));
        assert!(crop(&image, CropRect::new(120, 0, 100, 10)).is_none());
    }
}
