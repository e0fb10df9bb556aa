//! Mechanism for loading and sharing the demo pipeline configuration

use crate::{numeric::Float, Result};
use anyhow::{ensure, format_err, Context, Error};

use std::{fs::File, io::Read, str::FromStr};

/// Demo pipeline configuration
///
/// One value per line, first whitespace-separated token; list-valued
/// entries use comma-separated tokens. The line order matches the field
/// order below.
pub struct Configuration {
    /// Number of events to be processed
    pub num_events: u32,

    /// Run number, part of every event's identifier
    pub run_number: u32,

    /// Base seed all per-event seeds derive from
    pub base_seed: u64,

    /// Hit acceptance threshold
    pub threshold: Float,

    /// Unit of the threshold: MIP, GeV or px
    pub threshold_unit: String,

    /// Most probable MIP energy deposit (GeV)
    pub mip_calibration: Float,

    /// Energy to create one electron-hole pair in silicon (eV)
    pub eh_pair_energy: Float,

    /// Width of the per-channel gain miscalibration
    pub miscal_uncorrel: Float,

    /// Width of the event-correlated gain miscalibration
    pub miscal_correl: Float,

    /// Fraction of randomly dead channels
    pub dead_cell_fraction: Float,

    /// Electronics noise as a fraction of one MIP
    pub elec_noise_mip: Float,

    /// Electronics dynamic range in MIPs
    pub elec_range_mip: Float,

    /// Apply the contribution timing window?
    pub time_apply: bool,

    /// Correct contribution times for the time of flight?
    pub time_correct_for_propagation: bool,

    /// Timing window lower bound (ns)
    pub time_window_min: Float,

    /// Timing window upper bound (ns)
    pub time_window_max: Float,

    /// Calibration coefficient per layer group
    pub calib_coefficients: Vec<Float>,

    /// Number of layers per calibration group
    pub calib_layer_groups: Vec<u32>,

    /// Cell pitch of the demo geometry (mm)
    pub cell_pitch: Float,

    /// Cell-edge-to-cell-edge distance across module boundaries (mm)
    pub inter_module_distance: Float,
}
//
impl Configuration {
    /// Load the configuration from a file, check it, and print it out
    pub fn load(file_name: &str) -> Result<Self> {
        // Read out the configuration file or die trying
        let config_str = {
            let mut config_file =
                File::open(file_name).with_context(|| format!("opening {file_name}"))?;
            let mut buffer = String::new();
            config_file.read_to_string(&mut buffer)?;
            buffer
        };

        // Iterate over the configuration items: the first non-whitespace
        // chunk of text on each line, ignoring blank lines
        let mut config_iter = config_str
            .lines()
            .filter_map(|line| line.split_whitespace().next());

        // This closure fetches the next configuration item, tagging it
        // with the name of the configuration field which it is supposed to
        // fill to ease error reporting, and handling end-of-file too
        let mut next_item = |name: &'static str| -> Result<ConfigItem> {
            config_iter
                .next()
                .map(|data| ConfigItem::new(name, data))
                .ok_or_else(|| format_err!("Missing configuration of {}", name))
        };

        // Decode the configuration items into concrete values
        let config = Configuration {
            num_events: next_item("num_events")?.parse::<u32>()?,
            run_number: next_item("run_number")?.parse::<u32>()?,
            base_seed: next_item("base_seed")?.parse::<u64>()?,
            threshold: next_item("threshold")?.parse::<Float>()?,
            threshold_unit: next_item("threshold_unit")?.parse::<String>()?,
            mip_calibration: next_item("mip_calibration")?.parse::<Float>()?,
            eh_pair_energy: next_item("eh_pair_energy")?.parse::<Float>()?,
            miscal_uncorrel: next_item("miscal_uncorrel")?.parse::<Float>()?,
            miscal_correl: next_item("miscal_correl")?.parse::<Float>()?,
            dead_cell_fraction: next_item("dead_cell_fraction")?.parse::<Float>()?,
            elec_noise_mip: next_item("elec_noise_mip")?.parse::<Float>()?,
            elec_range_mip: next_item("elec_range_mip")?.parse::<Float>()?,
            time_apply: next_item("time_apply")?.parse::<bool>()?,
            time_correct_for_propagation: next_item("time_correct_for_propagation")?
                .parse::<bool>()?,
            time_window_min: next_item("time_window_min")?.parse::<Float>()?,
            time_window_max: next_item("time_window_max")?.parse::<Float>()?,
            calib_coefficients: next_item("calib_coefficients")?.parse_list::<Float>()?,
            calib_layer_groups: next_item("calib_layer_groups")?.parse_list::<u32>()?,
            cell_pitch: next_item("cell_pitch")?.parse::<Float>()?,
            inter_module_distance: next_item("inter_module_distance")?.parse::<Float>()?,
        };

        // Display it to ease comparisons between runs
        config.print();

        // A sensible pipeline must process at least one event
        ensure!(config.num_events > 0, "Please process at least one event");

        // Geometry sanity, the rest is validated by the processors
        ensure!(config.cell_pitch > 0.0, "The cell pitch must be positive");

        // If nothing bad occurred, we can now return the configuration
        Ok(config)
    }

    /// Display the configuration
    pub fn print(&self) {
        println!("num_events             : {}", self.num_events);
        println!("run_number             : {}", self.run_number);
        println!("base_seed              : {}", self.base_seed);
        println!("threshold              : {}", self.threshold);
        println!("threshold_unit         : {}", self.threshold_unit);
        println!("mip_calibration        : {}", self.mip_calibration);
        println!("eh_pair_energy         : {}", self.eh_pair_energy);
        println!("miscal_uncorrel        : {}", self.miscal_uncorrel);
        println!("miscal_correl          : {}", self.miscal_correl);
        println!("dead_cell_fraction     : {}", self.dead_cell_fraction);
        println!("elec_noise_mip         : {}", self.elec_noise_mip);
        println!("elec_range_mip         : {}", self.elec_range_mip);
        println!("time_apply             : {}", self.time_apply);
        println!("time_correct_for_prop. : {}", self.time_correct_for_propagation);
        println!("time_window_min        : {}", self.time_window_min);
        println!("time_window_max        : {}", self.time_window_max);
        println!("calib_coefficients     : {:?}", self.calib_coefficients);
        println!("calib_layer_groups     : {:?}", self.calib_layer_groups);
        println!("cell_pitch             : {}", self.cell_pitch);
        println!("inter_module_distance  : {}", self.inter_module_distance);
    }
}
//
impl Default for Configuration {
    /// Silicon ECAL demo settings, used when no steering file is given
    fn default() -> Self {
        Self {
            num_events: 100,
            run_number: 1,
            base_seed: 12345,
            threshold: 0.5,
            threshold_unit: "MIP".to_owned(),
            mip_calibration: 1.7e-4,
            eh_pair_energy: 3.6,
            miscal_uncorrel: 0.0,
            miscal_correl: 0.0,
            dead_cell_fraction: 0.0,
            elec_noise_mip: 0.0,
            elec_range_mip: 2500.0,
            time_apply: true,
            time_correct_for_propagation: true,
            time_window_min: -0.5,
            time_window_max: 10.0,
            calib_coefficients: vec![0.0168, 0.0336],
            calib_layer_groups: vec![20, 10],
            cell_pitch: 5.1,
            inter_module_distance: 7.0,
        }
    }
}

/// A value from the configuration file, tagged with the struct field which
/// it is supposed to map for error reporting purposes
struct ConfigItem<'data> {
    name: &'static str,
    data: &'data str,
}
//
impl<'data> ConfigItem<'data> {
    /// Build a config item from a struct field tag and raw iterator data
    fn new(name: &'static str, data: &'data str) -> Self {
        Self { name, data }
    }

    /// Parse this data using Rust's standard parsing logic
    fn parse<T: FromStr>(self) -> Result<T>
    where
        <T as FromStr>::Err: ::std::error::Error + Send + Sync + 'static,
    {
        self.data
            .parse::<T>()
            .map_err(Error::new)
            .with_context(|| format!("Could not parse configuration of {}", self.name))
    }

    /// Parse comma-separated data into a list of values
    fn parse_list<T: FromStr>(self) -> Result<Vec<T>>
    where
        <T as FromStr>::Err: ::std::error::Error + Send + Sync + 'static,
    {
        self.data
            .split(',')
            .map(|token| {
                token
                    .parse::<T>()
                    .map_err(Error::new)
                    .with_context(|| format!("Could not parse configuration of {}", self.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_items_split_on_commas() {
        let item = ConfigItem::new("calib_coefficients", "42.9,85.8,120.0");
        assert_eq!(item.parse_list::<Float>().unwrap(), vec![42.9, 85.8, 120.0]);
    }

    #[test]
    fn bad_items_name_their_field() {
        let item = ConfigItem::new("num_events", "many");
        let message = format!("{:#}", item.parse::<u32>().unwrap_err());
        assert!(message.contains("num_events"));
    }
}
