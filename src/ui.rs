// src/ui.rs - Theme and the video + overlay widget
use eframe::egui::{self, Color32, Pos2, Rect, Vec2};

use crate::render::{Canvas, MarkerColor, OverlayCanvas, PixelPoint};
use crate::video::VideoFrame;

#[derive(Debug, Clone)]
pub struct Theme {
    pub error: Color32,
    pub success: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            error: Color32::from_rgb(244, 67, 54),
            success: Color32::from_rgb(76, 175, 80),
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

pub fn to_color32(color: MarkerColor) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.alpha_u8())
}

/// Camera image with the virtual-hand markers painted on top. When mirrored,
/// the image and the overlay flip together.
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    aspect_ratio: f32,
    mirror: bool,
}

impl VideoWidget {
    pub fn new(mirror: bool) -> Self {
        Self {
            texture: None,
            aspect_ratio: 4.0 / 3.0,
            mirror,
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &VideoFrame) {
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgb(size, frame.as_raw());
        if frame.height() > 0 {
            self.aspect_ratio = frame.width() as f32 / frame.height() as f32;
        }

        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::default()),
            None => {
                self.texture = Some(ctx.load_texture("video_frame", image, egui::TextureOptions::default()));
            }
        }
    }

    pub fn clear(&mut self) {
        self.texture = None;
    }

    pub fn show(&self, ui: &mut egui::Ui, overlay: Option<&OverlayCanvas>) {
        let available = ui.available_size();
        let mut size = Vec2::new(available.x, available.x / self.aspect_ratio);
        if size.y > available.y {
            size = Vec2::new(available.y * self.aspect_ratio, available.y);
        }
        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());
        let painter = ui.painter_at(rect);

        match &self.texture {
            Some(texture) => {
                let uv = if self.mirror {
                    Rect::from_min_max(Pos2::new(1.0, 0.0), Pos2::new(0.0, 1.0))
                } else {
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0))
                };
                painter.image(texture.id(), rect, uv, Color32::WHITE);
            }
            None => {
                painter.rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "No Video Signal",
                    egui::FontId::proportional(16.0),
                    Color32::from_rgb(150, 150, 155),
                );
            }
        }

        if let Some(overlay) = overlay {
            paint_overlay(&painter, rect, overlay, self.mirror);
        }
    }
}

/// Scales overlay pixel space onto the on-screen video rectangle.
fn paint_overlay(painter: &egui::Painter, rect: Rect, overlay: &OverlayCanvas, mirror: bool) {
    if overlay.width() == 0 || overlay.height() == 0 {
        return;
    }
    let scale = (rect.width() / overlay.width() as f32).min(rect.height() / overlay.height() as f32);

    for marker in overlay.markers() {
        let center = screen_position(marker.center, overlay, rect, mirror);
        painter.circle_filled(center, marker.radius * scale, to_color32(marker.color));
    }
}

fn screen_position(point: PixelPoint, overlay: &OverlayCanvas, rect: Rect, mirror: bool) -> Pos2 {
    let x = if mirror {
        overlay.width() as f32 - point.x as f32
    } else {
        point.x as f32
    };
    Pos2::new(
        rect.left() + x * rect.width() / overlay.width() as f32,
        rect.top() + point.y as f32 * rect.height() / overlay.height() as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elbows;
    use crate::landmarks::{Landmark, LandmarkSet, LEFT_ELBOW, POSE_LANDMARK_COUNT, RIGHT_ELBOW};
    use crate::render::{self, AmputationType, MarkerStyles};

    // In the raw camera image the wearer's left elbow sits on the right.
    fn facing_camera() -> LandmarkSet {
        let mut pose = vec![Landmark::new(0.5, 0.5, 0.0); POSE_LANDMARK_COUNT];
        pose[LEFT_ELBOW] = Landmark::new(0.8, 0.5, 0.0);
        pose[RIGHT_ELBOW] = Landmark::new(0.2, 0.5, 0.0);
        LandmarkSet::new(pose)
    }

    fn left_arm_marker() -> (OverlayCanvas, PixelPoint) {
        let mut canvas = OverlayCanvas::new(640, 480);
        let elbows = elbows::extract(&facing_camera());
        render::render_elbows(&mut canvas, &elbows, AmputationType::LeftArm, &MarkerStyles::default()).unwrap();
        let center = canvas.markers()[0].center;
        (canvas, center)
    }

    #[test]
    fn test_mirrored_view_puts_left_elbow_on_wearers_left() {
        let (canvas, center) = left_arm_marker();
        let rect = Rect::from_min_size(Pos2::new(10.0, 0.0), Vec2::new(320.0, 240.0));

        let on_screen = screen_position(center, &canvas, rect, true);

        // Same spot the mirrored texture shows source column 0.8.
        assert_eq!(on_screen, Pos2::new(10.0 + 0.2 * 320.0, 120.0));
        assert!(on_screen.x < rect.center().x);
    }

    #[test]
    fn test_unmirrored_view_matches_camera_image() {
        let (canvas, center) = left_arm_marker();
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(320.0, 240.0));

        assert_eq!(screen_position(center, &canvas, rect, false), Pos2::new(256.0, 120.0));
    }
}
