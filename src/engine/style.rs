use eframe::egui::Color32;

pub const BACKGROUND: Color32 = Color32::from_rgb(19, 23, 29);
pub const LINK_COLOR: Color32 = Color32::from_rgba_premultiplied(71, 75, 82, 150);
pub const HOVER_COLOR: Color32 = Color32::from_rgb(255, 164, 101);
pub const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
pub const LABEL_COLOR: Color32 = Color32::from_gray(238);

/// Number of gradient steps a metric-driven color field is quantized into, so
/// metric coloring still batches into a bounded number of fills.
pub const METRIC_BUCKETS: usize = 8;

const CATEGORY_PALETTE: [Color32; 10] = [
    Color32::from_rgb(86, 156, 214),
    Color32::from_rgb(241, 146, 94),
    Color32::from_rgb(126, 200, 120),
    Color32::from_rgb(203, 120, 220),
    Color32::from_rgb(236, 112, 130),
    Color32::from_rgb(96, 204, 196),
    Color32::from_rgb(220, 196, 96),
    Color32::from_rgb(150, 150, 230),
    Color32::from_rgb(180, 140, 100),
    Color32::from_rgb(160, 170, 180),
];

pub fn category_color(category: usize) -> Color32 {
    CATEGORY_PALETTE[category % CATEGORY_PALETTE.len()]
}

pub fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

/// Cold-to-warm gradient used when a metric drives color.
pub fn metric_color(t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let r = (55.0 + (190.0 * t)) as u8;
    let g = (150.0 - (70.0 * t)) as u8;
    let b = (215.0 - (155.0 * t)) as u8;
    Color32::from_rgb(r, g, b)
}

pub fn metric_bucket(t: f32) -> usize {
    ((t.clamp(0.0, 1.0) * METRIC_BUCKETS as f32) as usize).min(METRIC_BUCKETS - 1)
}

pub fn metric_bucket_color(bucket: usize) -> Color32 {
    metric_color((bucket as f32 + 0.5) / METRIC_BUCKETS as f32)
}
