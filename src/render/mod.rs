//! Fixed-cadence presentation: compositing canvas, HUD drawing and the
//! output surface.

pub mod canvas;
pub mod font;
pub mod hud;
pub mod presentation;
pub mod surface;
pub mod ticker;

pub use canvas::Canvas;
pub use presentation::PresentationLoop;
pub use surface::DisplaySurface;
pub use ticker::TickClock;
