//! Third-party services: image hosting, SMS and crop forecasts.
//!
//! Each integration is optional. When its settings are missing the caller
//! gets a fallback (an avatar URL, no notification, canned forecast data).

pub mod forecast;
pub mod images;
pub mod sms;

pub use forecast::{CropForecast, Forecast, ForecastClient, ForecastError, ForecastSource, Insight};
pub use images::{ImageError, ImageHost, ImageUpload, avatar_url};
pub use sms::{SmsError, SmsNotifier};
