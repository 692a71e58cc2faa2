//! Pure geometry: frames, symbol outlines, connectors and margin placement.
//!
//! Nothing in here performs I/O or holds state across calls (the placement
//! solver's band counters live for a single page). Every export target goes
//! through the same four functions, which is what keeps the editor preview,
//! the annotated PNG and the PDF in agreement.
//!
//! ```text
//! display point ──transform──▶ target point ──shapes──▶ primitives
//!                                    │
//!                                    └──connector──▶ line + arrowhead
//! detected point ──placement──▶ (anchor, target)
//! ```

pub mod connector;
pub mod placement;
pub mod shapes;
pub mod transform;

pub use connector::{connector, Connector, ConnectorStyle};
pub use placement::{Band, BandRect, Placement, SymbolPlacementSolver};
pub use shapes::{Primitive, ShapeGeometry, ShapeRenderer};
pub use transform::{transform, CoordinateFrame, FrameKind};
