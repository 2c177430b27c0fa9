//! Bounding-box overlay for emitted frames.
//!
//! Draws class-colored rectangle outlines onto a copy of the frame; the
//! original buffer is never touched. Grayscale frames get the first
//! color channel only.

use crate::detect::{Detection, ItemClass};
use crate::frame::Frame;

const DAMAGED_RGB: [u8; 3] = [220, 40, 40];
const INTACT_RGB: [u8; 3] = [40, 200, 80];
const BORDER_PX: u32 = 2;

/// Copy the frame and outline every detection on it.
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut data = frame.data().to_vec();
    for detection in detections {
        let color = match detection.class {
            ItemClass::Damaged => DAMAGED_RGB,
            ItemClass::Intact => INTACT_RGB,
        };
        draw_outline(&mut data, frame, detection, color);
    }
    frame.with_data(data)
}

fn draw_outline(data: &mut [u8], frame: &Frame, detection: &Detection, color: [u8; 3]) {
    let x1 = clamp(detection.bbox.x1, frame.width);
    let x2 = clamp(detection.bbox.x2, frame.width);
    let y1 = clamp(detection.bbox.y1, frame.height);
    let y2 = clamp(detection.bbox.y2, frame.height);
    if x2 <= x1 || y2 <= y1 {
        return;
    }

    for y in y1..y2 {
        for x in x1..x2 {
            let on_horizontal = y < y1 + BORDER_PX || y + BORDER_PX >= y2;
            let on_vertical = x < x1 + BORDER_PX || x + BORDER_PX >= x2;
            if on_horizontal || on_vertical {
                put_pixel(data, frame, x, y, color);
            }
        }
    }
}

fn clamp(coord: f32, limit: u32) -> u32 {
    if coord <= 0.0 {
        return 0;
    }
    (coord.round() as u32).min(limit)
}

fn put_pixel(data: &mut [u8], frame: &Frame, x: u32, y: u32, color: [u8; 3]) {
    let channels = frame.channels as usize;
    let idx = (y as usize * frame.width as usize + x as usize) * channels;
    for (offset, value) in color.iter().enumerate().take(channels.min(3)) {
        data[idx + offset] = *value;
    }
}
