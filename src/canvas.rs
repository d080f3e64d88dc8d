//! Canvas interface and vertex-list plotting
//!
//! Plotting backends are external collaborators; the core only depends
//! on the [`Canvas`] operation set (polygons, colours, a bounding box,
//! and a `write` sink). [`VertexListCanvas`] is the in-crate recorder:
//! it keeps every polygon as a vertex list and serialises the lot as
//! JSON — the only persisted artefact in the crate.
//!
//! Enclosures draw themselves by parameter subdivision (each piece
//! contributes its projected bounding rectangle); pavings draw their
//! enabled cells.

use crate::enclosure::Enclosure;
use crate::grid::GridPaving;
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::Path;

/// An RGB colour.
pub type Colour = (u8, u8, u8);

/// Selection of the two state components to plot.
#[derive(Copy, Clone, Debug)]
pub struct Projection2 {
    /// Component drawn on the horizontal axis.
    pub x: usize,
    /// Component drawn on the vertical axis.
    pub y: usize,
}

impl Projection2 {
    /// Project the first two components.
    pub fn xy() -> Self {
        Projection2 { x: 0, y: 1 }
    }
}

/// The drawing surface operations the core calls.
pub trait Canvas {
    /// Set the fill colour for subsequent polygons.
    fn set_fill_colour(&mut self, colour: Colour);
    /// Set the line colour for subsequent polygons.
    fn set_line_colour(&mut self, colour: Colour);
    /// Declare the drawing extents.
    fn set_bounding_box(&mut self, lower: (f64, f64), upper: (f64, f64));
    /// Draw a closed polygon through the given vertices.
    fn draw_polygon(&mut self, vertices: &[(f64, f64)]);
    /// Flush the picture to a file.
    fn write(&self, path: &Path) -> std::io::Result<()>;
}

/// One recorded polygon.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Polygon {
    /// Closed vertex loop.
    pub vertices: Vec<(f64, f64)>,
    /// Fill colour.
    pub fill: Colour,
    /// Line colour.
    pub line: Colour,
}

/// A canvas that records vertex lists and writes them out as JSON.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VertexListCanvas {
    polygons: Vec<Polygon>,
    bounding_box: Option<((f64, f64), (f64, f64))>,
    #[serde(skip)]
    fill: Colour,
    #[serde(skip)]
    line: Colour,
}

impl VertexListCanvas {
    /// An empty canvas.
    pub fn new() -> Self {
        VertexListCanvas {
            polygons: Vec::new(),
            bounding_box: None,
            fill: (200, 200, 255),
            line: (0, 0, 0),
        }
    }

    /// The recorded polygons.
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }
}

impl Canvas for VertexListCanvas {
    fn set_fill_colour(&mut self, colour: Colour) {
        self.fill = colour;
    }

    fn set_line_colour(&mut self, colour: Colour) {
        self.line = colour;
    }

    fn set_bounding_box(&mut self, lower: (f64, f64), upper: (f64, f64)) {
        self.bounding_box = Some((lower, upper));
    }

    fn draw_polygon(&mut self, vertices: &[(f64, f64)]) {
        self.polygons.push(Polygon {
            vertices: vertices.to_vec(),
            fill: self.fill,
            line: self.line,
        });
    }

    fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        let mut f = std::fs::File::create(path)?;
        f.write_all(json.as_bytes())
    }
}

fn rectangle(x: &crate::interval::Interval, y: &crate::interval::Interval) -> [(f64, f64); 4] {
    [
        (x.lower(), y.lower()),
        (x.upper(), y.lower()),
        (x.upper(), y.upper()),
        (x.lower(), y.upper()),
    ]
}

impl Enclosure {
    /// Draw the projected set: subdivide the parameter domain a few
    /// levels, draw each piece's projected bounding rectangle.
    pub fn draw(&self, canvas: &mut dyn Canvas, projection: Projection2) {
        fn rec(enc: &Enclosure, canvas: &mut dyn Canvas, projection: Projection2, depth: u32) {
            if depth == 0 || enc.radius() < 1e-6 {
                let bb = enc.bounding_box();
                canvas.draw_polygon(&rectangle(bb.get(projection.x), bb.get(projection.y)));
                return;
            }
            match enc.split_widest() {
                Ok((a, b)) => {
                    rec(&a, canvas, projection, depth - 1);
                    rec(&b, canvas, projection, depth - 1);
                }
                Err(_) => {
                    let bb = enc.bounding_box();
                    canvas.draw_polygon(&rectangle(bb.get(projection.x), bb.get(projection.y)));
                }
            }
        }
        rec(self, canvas, projection, 3);
    }
}

impl GridPaving {
    /// Draw every enabled cell as a rectangle.
    pub fn draw(&self, canvas: &mut dyn Canvas, projection: Projection2) {
        let bb = self.bounding_box();
        if !bb.is_empty() {
            canvas.set_bounding_box(
                (bb.get(projection.x).lower(), bb.get(projection.y).lower()),
                (bb.get(projection.x).upper(), bb.get(projection.y).upper()),
            );
        }
        for cell in self.cell_boxes() {
            canvas.draw_polygon(&rectangle(cell.get(projection.x), cell.get(projection.y)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, GridPaving};
    use crate::interval::{Interval, IntervalBox};

    #[test]
    fn enclosure_draw_covers_the_set() {
        let b = IntervalBox::new(vec![Interval::new(0.0, 1.0), Interval::new(2.0, 3.0)]);
        let enc = Enclosure::from_box(&b, vec!["x".into(), "y".into()]);
        let mut canvas = VertexListCanvas::new();
        enc.draw(&mut canvas, Projection2::xy());
        assert!(!canvas.polygons().is_empty());
        // The union of rectangles spans the box corners.
        let xs: Vec<f64> = canvas
            .polygons()
            .iter()
            .flat_map(|p| p.vertices.iter().map(|v| v.0))
            .collect();
        assert!(xs.iter().cloned().fold(f64::INFINITY, f64::min) <= 0.0);
        assert!(xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max) >= 1.0);
    }

    #[test]
    fn paving_draw_emits_one_polygon_per_cell() {
        let mut p = GridPaving::new(Grid::unit(2), 1);
        p.adjoin_outer_box(
            &IntervalBox::new(vec![Interval::new(0.0, 1.0), Interval::new(0.0, 1.0)]),
            1,
        )
        .unwrap();
        p.recombine();
        let mut canvas = VertexListCanvas::new();
        p.draw(&mut canvas, Projection2::xy());
        assert_eq!(canvas.polygons().len(), p.cell_count());
    }

    #[test]
    fn vertex_lists_serialize_round_trip() {
        let mut canvas = VertexListCanvas::new();
        canvas.set_fill_colour((10, 20, 30));
        canvas.draw_polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let json = serde_json::to_string(&canvas).unwrap();
        let back: VertexListCanvas = serde_json::from_str(&json).unwrap();
        assert_eq!(back.polygons().len(), 1);
        assert_eq!(back.polygons()[0].fill, (10, 20, 30));
    }
}
