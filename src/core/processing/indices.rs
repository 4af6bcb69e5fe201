//! Vegetation and water indices computed from reflectance bands.
//!
//! Bands are looked up by role (red, nir, ...) through the platform's [`BandRoles`], read at
//! the run's target resolution and divided by the platform's quantification value.
use ndarray::{Array2, Zip, s};
use tracing::debug;

use crate::core::config::BandRoles;
use crate::error::{Error, Result};
use crate::io::raster_store::RasterStore;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BandRole {
    Blue,
    Green,
    Red,
    RedEdge1,
    Nir,
    Swir1,
    Swir2,
}

impl BandRole {
    pub fn band_name(self, roles: &BandRoles) -> Option<&str> {
        let name = match self {
            BandRole::Blue => &roles.blue,
            BandRole::Green => &roles.green,
            BandRole::Red => &roles.red,
            BandRole::RedEdge1 => &roles.rededge1,
            BandRole::Nir => &roles.nir,
            BandRole::Swir1 => &roles.swir1,
            BandRole::Swir2 => &roles.swir2,
        };
        name.as_deref()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum VegetationIndex {
    Ndvi,
    Rvi,
    Savi,
    Nbr,
    Kndvi,
    Ndmi,
    Mndwi,
    Evi,
    Evi2,
    Dvi,
    Cvi,
    Mcari,
    Ndi45,
    Ndwi,
}

fn ratio(num: f32, den: f32) -> f32 {
    if den == 0.0 { f32::NAN } else { num / den }
}

fn normalized_difference(a: f32, b: f32) -> f32 {
    ratio(a - b, a + b)
}

impl VegetationIndex {
    pub const ALL: [VegetationIndex; 14] = [
        VegetationIndex::Ndvi,
        VegetationIndex::Rvi,
        VegetationIndex::Savi,
        VegetationIndex::Nbr,
        VegetationIndex::Kndvi,
        VegetationIndex::Ndmi,
        VegetationIndex::Mndwi,
        VegetationIndex::Evi,
        VegetationIndex::Evi2,
        VegetationIndex::Dvi,
        VegetationIndex::Cvi,
        VegetationIndex::Mcari,
        VegetationIndex::Ndi45,
        VegetationIndex::Ndwi,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VegetationIndex::Ndvi => "ndvi",
            VegetationIndex::Rvi => "rvi",
            VegetationIndex::Savi => "savi",
            VegetationIndex::Nbr => "nbr",
            VegetationIndex::Kndvi => "kndvi",
            VegetationIndex::Ndmi => "ndmi",
            VegetationIndex::Mndwi => "mndwi",
            VegetationIndex::Evi => "evi",
            VegetationIndex::Evi2 => "evi2",
            VegetationIndex::Dvi => "dvi",
            VegetationIndex::Cvi => "cvi",
            VegetationIndex::Mcari => "mcari",
            VegetationIndex::Ndi45 => "ndi45",
            VegetationIndex::Ndwi => "ndwi",
        }
    }

    /// Case-insensitive lookup
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    /// Input bands in the order `compute` expects them
    pub fn required_bands(self) -> &'static [BandRole] {
        use BandRole::*;
        match self {
            VegetationIndex::Ndvi
            | VegetationIndex::Rvi
            | VegetationIndex::Savi
            | VegetationIndex::Kndvi
            | VegetationIndex::Evi2
            | VegetationIndex::Dvi => &[Nir, Red],
            VegetationIndex::Nbr => &[Nir, Swir2],
            VegetationIndex::Ndmi => &[Nir, Swir1],
            VegetationIndex::Mndwi => &[Green, Swir1],
            VegetationIndex::Evi => &[Nir, Red, Blue],
            VegetationIndex::Cvi => &[Nir, Red, Green],
            VegetationIndex::Mcari => &[RedEdge1, Red, Green],
            VegetationIndex::Ndi45 => &[RedEdge1, Red],
            VegetationIndex::Ndwi => &[Green, Nir],
        }
    }

    /// Apply the index formula to co-registered reflectance arrays of equal shape, given in
    /// `required_bands` order
    pub fn compute(self, bands: &[Array2<f32>]) -> Array2<f32> {
        let a = &bands[0];
        let b = &bands[1];
        let two = |f: fn(f32, f32) -> f32| Zip::from(a).and(b).map_collect(|&x, &y| f(x, y));
        match self {
            VegetationIndex::Ndvi => two(normalized_difference),
            VegetationIndex::Rvi => two(ratio),
            VegetationIndex::Savi => two(|nir, red| 1.5 * ratio(nir - red, nir + red + 0.5)),
            VegetationIndex::Nbr | VegetationIndex::Ndmi | VegetationIndex::Mndwi => {
                two(normalized_difference)
            }
            VegetationIndex::Kndvi => {
                two(|nir, red| normalized_difference(nir, red).powi(2).tanh())
            }
            VegetationIndex::Evi2 => two(|nir, red| 2.4 * ratio(nir - red, nir + red + 1.0)),
            VegetationIndex::Dvi => two(|nir, red| nir - red),
            VegetationIndex::Ndi45 | VegetationIndex::Ndwi => two(normalized_difference),
            VegetationIndex::Evi => Zip::from(a)
                .and(b)
                .and(&bands[2])
                .map_collect(|&nir, &red, &blue| {
                    2.5 * ratio(nir - red, nir + 6.0 * red - 7.5 * blue + 1.0)
                }),
            VegetationIndex::Cvi => Zip::from(a)
                .and(b)
                .and(&bands[2])
                .map_collect(|&nir, &red, &green| ratio(nir * red, green * green)),
            VegetationIndex::Mcari => Zip::from(a)
                .and(b)
                .and(&bands[2])
                .map_collect(|&re1, &red, &green| {
                    ((re1 - red) - 0.2 * (re1 - green)) * ratio(re1, red)
                }),
        }
    }
}

/// Indices whose input bands are all configured for a platform
pub fn supported_indices(roles: &BandRoles) -> Vec<&'static str> {
    VegetationIndex::ALL
        .into_iter()
        .filter(|i| i.required_bands().iter().all(|r| r.band_name(roles).is_some()))
        .map(|i| i.name())
        .collect()
}

/// Crop arrays to their common (smallest) shape; truncating resampling can leave bands
/// one pixel apart
pub fn crop_to_common(arrays: Vec<Array2<f32>>) -> Vec<Array2<f32>> {
    let rows = arrays.iter().map(|a| a.nrows()).min().unwrap_or(0);
    let cols = arrays.iter().map(|a| a.ncols()).min().unwrap_or(0);
    arrays
        .into_iter()
        .map(|a| {
            if a.dim() == (rows, cols) {
                a
            } else {
                a.slice(s![..rows, ..cols]).to_owned()
            }
        })
        .collect()
}

/// Index and band retrieval over one tile's [`RasterStore`]
pub struct IndexCalculator<'a> {
    store: &'a RasterStore,
    roles: &'a BandRoles,
    resolution: f64,
    quantification: f32,
}

impl<'a> IndexCalculator<'a> {
    pub fn new(
        store: &'a RasterStore,
        roles: &'a BandRoles,
        resolution: f64,
        quantification: f32,
    ) -> Self {
        Self {
            store,
            roles,
            resolution,
            quantification,
        }
    }

    pub fn supported_indices(&self) -> Vec<&'static str> {
        supported_indices(self.roles)
    }

    fn reflectance(&self, role: BandRole) -> Result<Array2<f32>> {
        let name = role.band_name(self.roles).ok_or_else(|| {
            Error::Config(format!("no band configured for role {:?}", role))
        })?;
        let q = self.quantification;
        Ok(self.store.band_at(name, self.resolution)?.mapv_into(|v| v / q))
    }

    pub fn calculate_index(&self, name: &str) -> Result<Array2<f32>> {
        let index = VegetationIndex::from_name(name).ok_or_else(|| Error::InvalidArgument {
            arg: "index",
            value: name.to_string(),
        })?;
        let bands = index
            .required_bands()
            .iter()
            .map(|role| self.reflectance(*role))
            .collect::<Result<Vec<_>>>()?;
        let bands = crop_to_common(bands);
        debug!("Computing {} on {:?}", index.name(), bands[0].dim());
        Ok(index.compute(&bands))
    }

    /// Raw band values at the target resolution
    pub fn band(&self, name: &str) -> Result<Array2<f32>> {
        self.store.band_at(name, self.resolution)
    }
}
