/* ************************************************************************ **
** This file is part of kdots, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of kdots is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

// NOTE: Please make sure to use the YamlRead trait when deserializing these types!

use kdots_core::{Complex64, Dims, SpinorMode};
use kdots_gauge::OnAmbiguous;
use kdots_overlap::OnMissing;

/// Root settings object, after [`Settings::validate`].
///
/// Every consumer takes its values from here.
#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSettings(pub Settings);

/// Raw deserialized form of settings.
///
/// Use [`Settings::validate`] before doing anything with it.
///
/// ```yaml
/// threads: 4
/// points: 2
/// directions: 2
/// bands: 2
/// grid-points: 4
/// reference-point: 0
/// spinor: single
/// gauge:
///   threshold: 1.0e-5
///   on-ambiguous: abort
/// overlap:
///   on-missing: fill
///   fill-value: [0.0, 0.0]
/// ```
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Size of the worker pool. Defaults to the number of cores.
    #[serde(default)]
    pub threads: Option<usize>,

    /// Number of k-points in the mesh.
    pub points: usize,

    /// Number of neighbor slots per k-point.
    pub directions: usize,

    pub bands: usize,

    /// Length of each real-space field.
    pub grid_points: usize,

    /// Index of the grid point at which each wavefunction is made real and positive.
    pub reference_point: usize,

    #[serde(default)]
    pub spinor: SpinorMode,

    #[serde(default)]
    pub gauge: Gauge,

    #[serde(default)]
    pub overlap: Overlap,
}
derive_yaml_read!{Settings}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Gauge {
    /// Smallest modulus at the reference point that still defines a phase.
    #[serde(default = "_gauge__threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub on_ambiguous: OnAmbiguous,
}
fn _gauge__threshold() -> f64 { kdots_gauge::DEFAULT_THRESHOLD }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Overlap {
    #[serde(default)]
    pub on_missing: OnMissing,

    /// `[re, im]` of the value written into edges that could not be computed
    /// under `on-missing: fill`. Defaults to NaN.
    #[serde(default = "_overlap__fill_value")]
    pub fill_value: [f64; 2],
}
fn _overlap__fill_value() -> [f64; 2] { [std::f64::NAN, std::f64::NAN] }

// --------------------------------------------------------

impl Default for Gauge {
    fn default() -> Self {
        Gauge { threshold: _gauge__threshold(), on_ambiguous: Default::default() }
    }
}

impl Default for Overlap {
    fn default() -> Self {
        Overlap { on_missing: Default::default(), fill_value: _overlap__fill_value() }
    }
}

// --------------------------------------------------------

impl ValidatedSettings {
    pub fn threads(&self) -> usize
    { self.0.threads.unwrap_or_else(num_cpus::get) }

    pub fn dims(&self) -> Dims {
        let Settings { points, directions, bands, grid_points, .. } = self.0;
        Dims { points, directions, bands, grid_points }
    }

    pub fn spinor(&self) -> SpinorMode
    { self.0.spinor }

    pub fn reference_point(&self) -> usize
    { self.0.reference_point }

    pub fn gauge(&self) -> &Gauge
    { &self.0.gauge }

    pub fn overlap(&self) -> &Overlap
    { &self.0.overlap }

    pub fn fill_value(&self) -> Complex64 {
        let [re, im] = self.0.overlap.fill_value;
        Complex64::new(re, im)
    }
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;
    use crate::YamlRead;

    fn from_empty_mapping<T: for<'de> serde::Deserialize<'de>>() -> serde_yaml::Result<T> {
        use serde_yaml::{from_value, Mapping, Value};
        from_value(Value::Mapping(Mapping::new()))
    }

    #[test]
    fn test_defaults() {
        // the serde defaults agree with Default
        assert_eq!(from_empty_mapping::<Gauge>().unwrap(), Gauge::default());
        assert_eq!(from_empty_mapping::<Overlap>().unwrap().on_missing, OnMissing::Abort);

        let gauge = Gauge::default();
        assert_eq!(gauge.threshold, 1e-5);
        assert_eq!(gauge.on_ambiguous, OnAmbiguous::Abort);

        let overlap = Overlap::default();
        assert_eq!(overlap.on_missing, OnMissing::Abort);
        assert!(overlap.fill_value.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn minimal() {
        let yaml = "points: 2\ndirections: 2\nbands: 2\ngrid-points: 4\nreference-point: 0\n";
        let settings = Settings::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(settings.threads, None);
        assert_eq!(settings.spinor, SpinorMode::Single);
        assert_eq!(settings.gauge, Gauge::default());
    }

    #[test]
    fn full() {
        let yaml = "\
threads: 1
points: 8
directions: 6
bands: 3
grid-points: 100
reference-point: 17
spinor: two-channel
gauge:
  threshold: 1.0e-3
  on-ambiguous: skip
overlap:
  on-missing: fill
  fill-value: [0.0, -1.5]
";
        let settings = Settings::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(settings.threads, Some(1));
        assert_eq!(settings.spinor, SpinorMode::TwoChannel);
        assert_eq!(settings.gauge, Gauge { threshold: 1e-3, on_ambiguous: OnAmbiguous::Skip });
        assert_eq!(settings.overlap, Overlap { on_missing: OnMissing::Fill, fill_value: [0.0, -1.5] });

        let settings = ValidatedSettings(settings);
        assert_eq!(settings.dims(), Dims { points: 8, directions: 6, bands: 3, grid_points: 100 });
        assert_eq!(settings.fill_value(), Complex64::new(0.0, -1.5));
        assert_eq!(settings.threads(), 1);
    }

    #[test]
    fn typos_are_not_fatal() {
        let yaml = "points: 2\ndirections: 2\nbands: 2\ngrid-points: 4\nreference-point: 0\nbandz: 3\n";
        assert_eq!(Settings::from_reader(yaml.as_bytes()).unwrap().bands, 2);
    }

    #[test]
    fn bad_enum_is_fatal() {
        let yaml = "points: 2\ndirections: 2\nbands: 2\ngrid-points: 4\nreference-point: 0\nspinor: triple\n";
        assert!(Settings::from_reader(yaml.as_bytes()).is_err());
    }
}
