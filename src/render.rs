// src/render.rs - Coordinate mapping and virtual-hand marker drawing
use serde::{Deserialize, Serialize};

use crate::elbows::ElbowPositions;
use crate::error::RenderError;
use crate::landmarks::Landmark;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Which side(s) get a virtual marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmputationType {
    #[default]
    LeftArm,
    RightArm,
    Both,
}

impl AmputationType {
    pub const ALL: [AmputationType; 3] = [Self::LeftArm, Self::RightArm, Self::Both];

    pub fn sides(self) -> &'static [Side] {
        match self {
            AmputationType::LeftArm => &[Side::Left],
            AmputationType::RightArm => &[Side::Right],
            AmputationType::Both => &[Side::Left, Side::Right],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AmputationType::LeftArm => "Left Arm",
            AmputationType::RightArm => "Right Arm",
            AmputationType::Both => "Both Arms",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Opacity in [0, 1].
    pub alpha: f32,
}

impl MarkerColor {
    pub const fn rgba(r: u8, g: u8, b: u8, alpha: f32) -> Self {
        Self { r, g, b, alpha }
    }

    pub fn alpha_u8(&self) -> u8 {
        (self.alpha.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

pub const LEFT_MARKER_COLOR: MarkerColor = MarkerColor::rgba(255, 0, 0, 0.6);
pub const RIGHT_MARKER_COLOR: MarkerColor = MarkerColor::rgba(0, 255, 0, 0.6);
pub const DEFAULT_MARKER_RADIUS: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub radius: f32,
    pub color: MarkerColor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyles {
    pub radius: f32,
    pub left_color: MarkerColor,
    pub right_color: MarkerColor,
}

impl Default for MarkerStyles {
    fn default() -> Self {
        Self {
            radius: DEFAULT_MARKER_RADIUS,
            left_color: LEFT_MARKER_COLOR,
            right_color: RIGHT_MARKER_COLOR,
        }
    }
}

impl MarkerStyles {
    pub fn style_for(&self, side: Side) -> MarkerStyle {
        let color = match side {
            Side::Left => self.left_color,
            Side::Right => self.right_color,
        };
        MarkerStyle {
            radius: self.radius,
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// A drawing surface with a fixed pixel size.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Wipes the whole surface.
    fn clear(&mut self) -> Result<(), RenderError>;
    fn fill_circle(
        &mut self,
        center: PixelPoint,
        radius: f32,
        color: MarkerColor,
    ) -> Result<(), RenderError>;
}

/// Scales a normalized coordinate to canvas pixels, clamped to the canvas
/// so slight landmark jitter past the frame edge stays on screen.
pub fn map_to_canvas(x: f64, y: f64, width: u32, height: u32) -> Result<PixelPoint, RenderError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(RenderError::InvalidCoordinates { x, y });
    }
    let (w, h) = (width as f64, height as f64);
    Ok(PixelPoint {
        x: (x * w).clamp(0.0, w),
        y: (y * h).clamp(0.0, h),
    })
}

/// Clears the canvas, then draws one marker per selected side that has an
/// elbow this frame. Returns the number of markers drawn.
pub fn render_elbows<C: Canvas + ?Sized>(
    canvas: &mut C,
    elbows: &ElbowPositions,
    amputation: AmputationType,
    styles: &MarkerStyles,
) -> Result<usize, RenderError> {
    canvas.clear()?;

    let mut drawn = 0;
    for &side in amputation.sides() {
        let elbow = match side {
            Side::Left => elbows.left_elbow,
            Side::Right => elbows.right_elbow,
        };
        if let Some(elbow) = elbow {
            draw_marker(canvas, &elbow, styles.style_for(side))?;
            drawn += 1;
        }
    }
    Ok(drawn)
}

/// Clear-map-draw for a single position (socket transport updates).
pub fn render_position<C: Canvas + ?Sized>(
    canvas: &mut C,
    position: &Landmark,
    style: MarkerStyle,
) -> Result<(), RenderError> {
    canvas.clear()?;
    draw_marker(canvas, position, style)
}

fn draw_marker<C: Canvas + ?Sized>(
    canvas: &mut C,
    landmark: &Landmark,
    style: MarkerStyle,
) -> Result<(), RenderError> {
    let center = map_to_canvas(landmark.x, landmark.y, canvas.width(), canvas.height())?;
    canvas.fill_circle(center, style.radius, style.color)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub center: PixelPoint,
    pub radius: f32,
    pub color: MarkerColor,
}

/// Retained overlay: the markers currently on screen, repainted by the host
/// every frame.
#[derive(Debug, Clone)]
pub struct OverlayCanvas {
    width: u32,
    height: u32,
    markers: Vec<Marker>,
}

impl OverlayCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            markers: Vec::new(),
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.markers.clear();
    }
}

impl Canvas for OverlayCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidCanvas {
                width: self.width,
                height: self.height,
            });
        }
        self.markers.clear();
        Ok(())
    }

    fn fill_circle(
        &mut self,
        center: PixelPoint,
        radius: f32,
        color: MarkerColor,
    ) -> Result<(), RenderError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(RenderError::InvalidRadius(radius));
        }
        if !center.x.is_finite() || !center.y.is_finite() {
            return Err(RenderError::InvalidCoordinates {
                x: center.x,
                y: center.y,
            });
        }
        self.markers.push(Marker {
            center,
            radius,
            color,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn elbows(left: Option<(f64, f64)>, right: Option<(f64, f64)>) -> ElbowPositions {
        ElbowPositions {
            left_elbow: left.map(|(x, y)| Landmark::new(x, y, 0.0)),
            right_elbow: right.map(|(x, y)| Landmark::new(x, y, 0.0)),
        }
    }

    #[test]
    fn test_both_with_left_absent() {
        let mut canvas = OverlayCanvas::new(640, 480);
        let drawn = render_elbows(
            &mut canvas,
            &elbows(None, Some((0.5, 0.5))),
            AmputationType::Both,
            &MarkerStyles::default(),
        )
        .unwrap();

        assert_eq!(drawn, 1);
        assert_eq!(canvas.markers().len(), 1);
        let marker = canvas.markers()[0];
        assert_eq!(marker.center, PixelPoint { x: 320.0, y: 240.0 });
        assert_eq!(marker.color, RIGHT_MARKER_COLOR);
        assert_eq!(marker.radius, DEFAULT_MARKER_RADIUS);
    }

    #[test]
    fn test_both_sides_get_distinct_colors() {
        let mut canvas = OverlayCanvas::new(640, 480);
        render_elbows(
            &mut canvas,
            &elbows(Some((0.25, 0.5)), Some((0.75, 0.5))),
            AmputationType::Both,
            &MarkerStyles::default(),
        )
        .unwrap();

        let markers = canvas.markers();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].color, LEFT_MARKER_COLOR);
        assert_eq!(markers[1].color, RIGHT_MARKER_COLOR);
        assert_ne!(markers[0].color, markers[1].color);
    }

    #[test]
    fn test_single_side_selection_ignores_other_elbow() {
        let mut canvas = OverlayCanvas::new(100, 100);
        let drawn = render_elbows(
            &mut canvas,
            &elbows(Some((0.1, 0.1)), Some((0.9, 0.9))),
            AmputationType::RightArm,
            &MarkerStyles::default(),
        )
        .unwrap();
        assert_eq!(drawn, 1);
        assert_eq!(canvas.markers()[0].center, PixelPoint { x: 90.0, y: 90.0 });
    }

    #[test]
    fn test_absent_elbow_clears_previous_marker() {
        let mut canvas = OverlayCanvas::new(640, 480);
        let styles = MarkerStyles::default();
        render_elbows(&mut canvas, &elbows(Some((0.5, 0.5)), None), AmputationType::LeftArm, &styles)
            .unwrap();
        assert_eq!(canvas.markers().len(), 1);

        render_elbows(&mut canvas, &elbows(None, None), AmputationType::LeftArm, &styles).unwrap();
        assert!(canvas.markers().is_empty());
    }

    #[test]
    fn test_redraw_is_idempotent() {
        let mut once = OverlayCanvas::new(640, 480);
        let mut twice = OverlayCanvas::new(640, 480);
        let input = elbows(Some((0.3, 0.4)), Some((0.6, 0.7)));
        let styles = MarkerStyles::default();

        render_elbows(&mut once, &input, AmputationType::Both, &styles).unwrap();
        render_elbows(&mut twice, &input, AmputationType::Both, &styles).unwrap();
        render_elbows(&mut twice, &input, AmputationType::Both, &styles).unwrap();

        assert_eq!(once.markers(), twice.markers());
    }

    #[test]
    fn test_invalid_canvas_and_style() {
        let mut empty = OverlayCanvas::new(0, 480);
        assert!(matches!(
            render_elbows(&mut empty, &elbows(Some((0.5, 0.5)), None), AmputationType::LeftArm, &MarkerStyles::default()),
            Err(RenderError::InvalidCanvas { .. })
        ));

        let mut canvas = OverlayCanvas::new(640, 480);
        let style = MarkerStyle {
            radius: 0.0,
            color: LEFT_MARKER_COLOR,
        };
        assert!(matches!(
            render_position(&mut canvas, &Landmark::new(0.5, 0.5, 0.0), style),
            Err(RenderError::InvalidRadius(_))
        ));
    }

    #[test]
    fn test_non_finite_coordinates_rejected() {
        assert!(map_to_canvas(f64::NAN, 0.5, 640, 480).is_err());
        assert!(map_to_canvas(0.5, f64::INFINITY, 640, 480).is_err());
    }

    #[test]
    fn test_amputation_serde_names() {
        let parsed: AmputationType = serde_json::from_str("\"right_arm\"").unwrap();
        assert_eq!(parsed, AmputationType::RightArm);
        assert_eq!(serde_json::to_string(&AmputationType::LeftArm).unwrap(), "\"left_arm\"");
    }

    proptest! {
        #[test]
        fn mapping_scales_unit_square(x in 0.0f64..=1.0, y in 0.0f64..=1.0, w in 1u32..4096, h in 1u32..4096) {
            let p = map_to_canvas(x, y, w, h).unwrap();
            prop_assert_eq!(p.x, x * w as f64);
            prop_assert_eq!(p.y, y * h as f64);
        }

        #[test]
        fn mapping_stays_on_canvas(x in -0.5f64..1.5, y in -0.5f64..1.5, w in 1u32..4096, h in 1u32..4096) {
            let p = map_to_canvas(x, y, w, h).unwrap();
            prop_assert!(p.x >= 0.0 && p.x <= w as f64);
            prop_assert!(p.y >= 0.0 && p.y <= h as f64);
        }
    }
}
