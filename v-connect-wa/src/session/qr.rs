use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::render::svg;
use qrcode::QrCode;
use std::time::Duration;
use tokio::time::Instant;

/// 二维码防抖：有效窗口内不替换已展示的二维码
/// QR debounce: a displayed QR is not replaced while still inside its window
#[derive(Debug)]
pub struct QrGate {
    ttl: Duration,
    shown_at: Option<Instant>,
}

impl QrGate {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, shown_at: None }
    }

    /// 是否接受新二维码；接受时窗口重置 / Whether to accept a new QR; accepting resets the window
    pub fn offer(&mut self) -> bool {
        match self.shown_at {
            Some(at) if at.elapsed() < self.ttl => false,
            _ => {
                self.shown_at = Some(Instant::now());
                true
            }
        }
    }

    /// 二维码不再展示（已连接或连接关闭）/ QR no longer displayed (connected or closed)
    pub fn clear(&mut self) {
        self.shown_at = None;
    }
}

/// 将配对负载渲染为 SVG data URL / Render a pairing payload into an SVG data URL
pub fn render_data_url(payload: &str) -> Result<String, qrcode::types::QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}
