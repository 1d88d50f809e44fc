use serde::{Deserialize, Serialize};

/// An 8-bit RGBA color.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Weight-proportional average of two colors, computed per channel (alpha included).
    ///
    /// A zero total weight yields `second`, so blending into a never-observed voxel simply takes the new color.
    pub fn blend_two_colors(first: Color, first_weight: f32, second: Color, second_weight: f32) -> Color {
        let total_weight = first_weight + second_weight;
        if total_weight <= 0.0 {
            return second;
        }
        let first_weight = first_weight / total_weight;
        let second_weight = second_weight / total_weight;

        let blend_channel = |a: u8, b: u8| -> u8 {
            let mixed = (a as f32 * first_weight + b as f32 * second_weight).round();
            mixed.clamp(0.0, u8::MAX as f32) as u8
        };

        Color {
            r: blend_channel(first.r, second.r),
            g: blend_channel(first.g, second.g),
            b: blend_channel(first.b, second.b),
            a: blend_channel(first.a, second.a),
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
