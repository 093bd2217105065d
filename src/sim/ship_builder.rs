//! Builds a ship from a grid of materials
//!
//! Every occupied cell becomes a point. Neighbouring cells are linked by
//! springs (east, south, south-east, south-west) and every fully occupied
//! 2x2 quad is covered by two triangles.

use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;

use super::points::Points;
use super::ship::Ship;
use super::springs::Springs;
use super::triangles::Triangles;
use super::types::{ElementCount, ElementIndex, NONE_ELEMENT_INDEX};
use crate::events::GameEventHandler;
use crate::material::{Material, MaterialDatabase};
use crate::parameters::GameParameters;

/// Neighbours a cell links to; together they cover every adjacent pair once
const SPRING_DIRECTIONS: [(i64, i64); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];

/// A rectangular grid of optional materials; row 0 is the top
#[derive(Debug, Clone)]
pub struct MaterialGrid {
    width: u32,
    height: u32,
    cells: Vec<Option<Arc<Material>>>,
}

impl MaterialGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    /// Map structural image pixels (row-major, top row first) to materials
    ///
    /// Pixels whose colour matches no material are empty.
    pub fn from_structural_image(
        width: u32,
        height: u32,
        pixels: &[[u8; 3]],
        materials: &MaterialDatabase,
    ) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);

        Self {
            width,
            height,
            cells: pixels
                .iter()
                .map(|&rgb| materials.by_structural_colour(rgb).cloned())
                .collect(),
        }
    }

    /// Build a grid from text rows; `legend` maps each character to a material
    pub fn from_rows(rows: &[&str], legend: impl Fn(char) -> Option<Arc<Material>>) -> Self {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;

        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if let Some(material) = legend(c) {
                    grid.set(x as u32, y as u32, material);
                }
            }
        }
        grid
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set(&mut self, x: u32, y: u32, material: Arc<Material>) {
        let i = self.cell_index(x, y);
        self.cells[i] = Some(material);
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&Arc<Material>> {
        self.cells[self.cell_index(x, y)].as_ref()
    }

    /// Number of occupied cells
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    #[inline]
    fn cell_index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }
}

pub struct ShipBuilder;

impl ShipBuilder {
    /// Build a ship; points are centred horizontally on x = 0, with the
    /// bottom row at y = 0
    pub fn build(
        ship_id: u32,
        grid: &MaterialGrid,
        game_parameters: &GameParameters,
        events: Rc<dyn GameEventHandler>,
    ) -> Ship {
        let width = grid.width() as i64;
        let height = grid.height() as i64;

        let occupied = |x: i64, y: i64| -> bool {
            x >= 0 && y >= 0 && x < width && y < height && grid.get(x as u32, y as u32).is_some()
        };

        //
        // Count first, the containers are fixed-size
        //

        let point_count = grid.occupied_count() as ElementCount;
        let mut spring_count: ElementCount = 0;
        let mut triangle_count: ElementCount = 0;
        for y in 0..height {
            for x in 0..width {
                if !occupied(x, y) {
                    continue;
                }
                spring_count += SPRING_DIRECTIONS
                    .iter()
                    .filter(|&&(dx, dy)| occupied(x + dx, y + dy))
                    .count() as ElementCount;
                if occupied(x + 1, y) && occupied(x, y + 1) && occupied(x + 1, y + 1) {
                    triangle_count += 2;
                }
            }
        }

        //
        // Points
        //

        let mut points = Points::new(point_count);
        let mut point_index_grid = vec![NONE_ELEMENT_INDEX; grid.cells.len()];
        let mut electrical_element_count: ElementIndex = 0;
        let half_width = width as f32 / 2.0;

        for y in 0..height {
            for x in 0..width {
                let Some(material) = grid.get(x as u32, y as u32) else {
                    continue;
                };

                let electrical_element_index = if material.electrical_properties.is_some() {
                    electrical_element_count += 1;
                    electrical_element_count - 1
                } else {
                    NONE_ELEMENT_INDEX
                };

                let position = Vec2::new(x as f32 - half_width, (height - 1 - y) as f32);
                let texture_coordinates = Vec2::new(
                    x as f32 / width as f32,
                    1.0 - y as f32 / height as f32,
                );

                point_index_grid[grid.cell_index(x as u32, y as u32)] = points.add(
                    position,
                    Arc::clone(material),
                    material.is_hull,
                    material.is_rope,
                    electrical_element_index,
                    1.0,
                    material.render_colour,
                    texture_coordinates,
                );
            }
        }

        let point_at = |x: i64, y: i64| point_index_grid[(y * width + x) as usize];

        //
        // Springs
        //

        let mut springs = Springs::new(spring_count);
        for y in 0..height {
            for x in 0..width {
                if !occupied(x, y) {
                    continue;
                }
                for &(dx, dy) in &SPRING_DIRECTIONS {
                    if !occupied(x + dx, y + dy) {
                        continue;
                    }
                    let (Some(material_a), Some(material_b)) = (
                        grid.get(x as u32, y as u32),
                        grid.get((x + dx) as u32, (y + dy) as u32),
                    ) else {
                        continue;
                    };

                    // The weaker material decides
                    let material = if material_b.strength < material_a.strength {
                        material_b
                    } else {
                        material_a
                    };

                    springs.add(
                        point_at(x, y),
                        point_at(x + dx, y + dy),
                        Arc::clone(material),
                        &mut points,
                        game_parameters,
                    );
                }
            }
        }

        //
        // Triangles
        //

        let mut triangles = Triangles::new(triangle_count);
        for y in 0..height {
            for x in 0..width {
                if occupied(x, y) && occupied(x + 1, y) && occupied(x, y + 1) && occupied(x + 1, y + 1)
                {
                    let top_left = point_at(x, y);
                    let top_right = point_at(x + 1, y);
                    let bottom_left = point_at(x, y + 1);
                    let bottom_right = point_at(x + 1, y + 1);

                    triangles.add(top_left, top_right, bottom_right, &mut points);
                    triangles.add(top_left, bottom_right, bottom_left, &mut points);
                }
            }
        }

        log::info!(
            "Built ship {ship_id}: {} points, {} springs, {} triangles, {} electrical elements",
            point_count,
            spring_count,
            triangle_count,
            electrical_element_count
        );

        Ship::new(ship_id, points, springs, triangles, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventHandler;
    use glam::Vec3;

    fn material(name: &str, strength: f32, is_hull: bool) -> Arc<Material> {
        Arc::new(Material {
            name: name.to_string(),
            mass: 100.0,
            strength,
            stiffness: 1.0,
            structural_colour: [0, 0, 0],
            render_colour: Vec3::ONE,
            is_hull,
            is_rope: false,
            electrical_properties: None,
            sound_properties: None,
        })
    }

    fn build(grid: &MaterialGrid) -> Ship {
        ShipBuilder::build(
            3,
            grid,
            &GameParameters::default(),
            Rc::new(NullEventHandler),
        )
    }

    #[test]
    fn test_block_element_counts() {
        let wood = material("Wood", 1.0, false);
        let grid = MaterialGrid::from_rows(&["###", "###"], |c| {
            (c == '#').then(|| Arc::clone(&wood))
        });
        let ship = build(&grid);

        assert_eq!(ship.id(), 3);
        assert_eq!(ship.points().element_count(), 6);
        // 2 rows x 2 east, 3 south, 2 south-east, 2 south-west
        assert_eq!(ship.springs().element_count(), 11);
        assert_eq!(ship.triangles().element_count(), 4);
    }

    #[test]
    fn test_positions_centred_with_y_up() {
        let wood = material("Wood", 1.0, false);
        let grid = MaterialGrid::from_rows(&["##", "##"], |c| {
            (c == '#').then(|| Arc::clone(&wood))
        });
        let ship = build(&grid);

        // Top-left cell
        assert_eq!(ship.points().position(0), Vec2::new(-1.0, 1.0));
        // Bottom-right cell
        assert_eq!(ship.points().position(3), Vec2::new(0.0, 0.0));
    }

    #[test]
    fn test_gaps_break_links() {
        let wood = material("Wood", 1.0, false);
        let grid = MaterialGrid::from_rows(&["# #"], |c| (c == '#').then(|| Arc::clone(&wood)));
        let ship = build(&grid);

        assert_eq!(ship.points().element_count(), 2);
        assert_eq!(ship.springs().element_count(), 0);
        assert_eq!(ship.triangles().element_count(), 0);
    }

    #[test]
    fn test_spring_takes_weaker_material_and_hull_is_watertight() {
        let iron = material("Iron", 3.0, true);
        let glass = material("Glass", 0.5, false);
        let grid = MaterialGrid::from_rows(&["IIG"], |c| match c {
            'I' => Some(Arc::clone(&iron)),
            'G' => Some(Arc::clone(&glass)),
            _ => None,
        });
        let ship = build(&grid);
        let springs = ship.springs();

        assert_eq!(springs.material(0).map(|m| m.name.as_str()), Some("Iron"));
        assert_eq!(springs.water_permeability(0), 0.0);
        assert_eq!(springs.material(1).map(|m| m.name.as_str()), Some("Glass"));
        assert_eq!(springs.water_permeability(1), 1.0);
    }

    #[test]
    fn test_grid_from_structural_image() {
        let json = r##"[{
            "name": "Wood",
            "mass": { "nominal_mass": 500.0, "density": 1.0 },
            "structural_colour": "#804000",
            "render_colour": "#a06020",
            "is_hull": false
        }]"##;
        let materials = MaterialDatabase::from_json_str(json).unwrap();
        let background = [0xff, 0xff, 0xff];
        let wood = [0x80, 0x40, 0x00];

        let grid = MaterialGrid::from_structural_image(2, 2, &[wood, background, wood, wood], &materials);

        assert_eq!(grid.occupied_count(), 3);
        assert!(grid.get(1, 0).is_none());
        assert_eq!(grid.get(0, 1).map(|m| m.name.as_str()), Some("Wood"));
    }
}
