use geodash_core::rewrite::{
    GEOGRAPHIC_COLUMN, GEOGRAPHIC_SRID, WEBMERCATOR_COLUMN, WEBMERCATOR_SRID,
};
use geodash_core::{BBoxFilterDefinition, DataviewError, Result};

use super::{sql_number, validate_identifier};

/// Latitude limit of the web mercator projection.
pub const MAX_LATITUDE: f64 = 85.0511287798066;

const EARTH_RADIUS: f64 = 6_378_137.0;

/// A bounding box in geographic coordinates (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Parse `west,south,east,north`.
    pub fn parse(raw: &str) -> Result<Self> {
        let coords = raw
            .split(',')
            .map(|c| c.trim().parse::<f64>().ok().filter(|n| n.is_finite()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| DataviewError::invalid_bbox(raw))?;

        match coords[..] {
            [west, south, east, north] => Ok(Self::new(west, south, east, north)),
            _ => Err(DataviewError::invalid_bbox(raw)),
        }
    }

    pub fn width(&self) -> f64 {
        (self.east - self.west).abs()
    }

    /// Project to spherical mercator meters: `[minx, miny, maxx, maxy]`.
    pub fn to_webmercator(&self) -> [f64; 4] {
        let (minx, miny) = lonlat_to_meters(self.west, self.south);
        let (maxx, maxy) = lonlat_to_meters(self.east, self.north);
        [minx, miny, maxx, maxy]
    }

    /// Clamp latitudes and split boxes crossing the antimeridian.
    pub(crate) fn normalized(self) -> Vec<BBox> {
        let south = self.south.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let north = self.north.clamp(-MAX_LATITUDE, MAX_LATITUDE);

        let mut east = self.east;
        if east < self.west {
            east += 360.0;
        }
        if east - self.west >= 360.0 {
            return vec![BBox::new(-180.0, south, 180.0, north)];
        }

        let west = (self.west + 180.0).rem_euclid(360.0) - 180.0;
        let east = east + (west - self.west);
        if east > 180.0 {
            vec![
                BBox::new(west, south, 180.0, north),
                BBox::new(-180.0, south, east - 360.0, north),
            ]
        } else {
            vec![BBox::new(west, south, east, north)]
        }
    }
}

fn lonlat_to_meters(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = lon.to_radians() * EARTH_RADIUS;
    let y = (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

/// Spatial-intersection filter against one geometry column.
#[derive(Debug, Clone, PartialEq)]
pub struct BBoxFilter {
    column: String,
    srid: u32,
    bboxes: Vec<BBox>,
}

impl BBoxFilter {
    pub fn new(column: &str, srid: u32, raw_bbox: &str) -> Result<Self> {
        let column = validate_identifier(column)?.to_string();
        let bboxes = BBox::parse(raw_bbox)?.normalized();
        Ok(Self {
            column,
            srid,
            bboxes,
        })
    }

    /// Filter on `the_geom_webmercator` at SRID 3857 (dataview results).
    pub fn webmercator(raw_bbox: &str) -> Result<Self> {
        Self::new(WEBMERCATOR_COLUMN, WEBMERCATOR_SRID, raw_bbox)
    }

    /// Filter on `the_geom` at SRID 4326 (widget search).
    pub fn geographic(raw_bbox: &str) -> Result<Self> {
        Self::new(GEOGRAPHIC_COLUMN, GEOGRAPHIC_SRID, raw_bbox)
    }

    pub fn from_definition(def: &BBoxFilterDefinition) -> Result<Self> {
        Self::new(&def.options.column, def.options.srid, &def.params.bbox)
    }

    pub fn srid(&self) -> u32 {
        self.srid
    }

    pub fn bboxes(&self) -> &[BBox] {
        &self.bboxes
    }

    pub fn sql(&self, query: &str) -> String {
        let predicates = self
            .bboxes
            .iter()
            .map(|bbox| {
                format!(
                    "ST_Intersects({}, ST_Transform(ST_MakeEnvelope({},{},{},{}, 4326), {}))",
                    self.column,
                    sql_number(bbox.west),
                    sql_number(bbox.south),
                    sql_number(bbox.east),
                    sql_number(bbox.north),
                    self.srid
                )
            })
            .collect::<Vec<_>>()
            .join(" OR ");
        format!("SELECT * FROM ({query}) _cdb_bbox_filter\nWHERE {predicates}")
    }
}
