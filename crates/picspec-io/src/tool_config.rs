//! Configuration file for the external spectrum/velocity-distribution tool.
//!
//! The tool reads a `key = value` text file. Only writing is supported; the
//! format is an output contract.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Parameters handed to the external spectrum executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumToolConfig {
    /// Number of energy bins of the spectrum.
    #[serde(default = "default_nbins")]
    pub nbins: usize,
    #[serde(default = "default_emax")]
    pub emax: f64,
    #[serde(default = "default_emin")]
    pub emin: f64,
    /// Box centre in de.
    pub center: [f64; 3],
    /// Box size in cells.
    pub sizes: [i64; 3],
    /// Number of velocity bins of the distributions.
    pub nbins_vdist: usize,
    pub vmax: f64,
    pub vmin: f64,
    pub tframe: u32,
}

fn default_nbins() -> usize {
    600
}
fn default_emax() -> f64 {
    100.0
}
fn default_emin() -> f64 {
    0.0001
}

impl SpectrumToolConfig {
    pub fn new(center: [f64; 3], sizes: [i64; 3], nbins_vdist: usize, vmin: f64, vmax: f64, tframe: u32) -> Self {
        Self {
            nbins: default_nbins(),
            emax: default_emax(),
            emin: default_emin(),
            center,
            sizes,
            nbins_vdist,
            vmax,
            vmin,
            tframe,
        }
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "***** Configuration file for velocity distribution *****")?;
        writeln!(w)?;
        writeln!(w, "nbins = {}", self.nbins)?;
        writeln!(w, "emax = {:?}", self.emax)?;
        writeln!(w, "emin = {:?}", self.emin)?;
        writeln!(w, "xc/de = {:6.2}", self.center[0])?;
        writeln!(w, "yc/de = {:6.2}", self.center[1])?;
        writeln!(w, "zc/de = {:6.2}", self.center[2])?;
        writeln!(w, "xsize = {}", self.sizes[0])?;
        writeln!(w, "ysize = {}", self.sizes[1])?;
        writeln!(w, "zsize = {}", self.sizes[2])?;
        writeln!(w, "nbins_vdist = {}", self.nbins_vdist)?;
        writeln!(w, "vmax = {:6.2}", self.vmax)?;
        writeln!(w, "vmin = {:6.2}", self.vmin)?;
        writeln!(w, "tframe = {}", self.tframe)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_format() {
        let config = SpectrumToolConfig::new([50.0, 0.5, -12.25], [24, 1, 48], 100, 0.0, 1.5, 7);
        let mut buf = Vec::new();
        config.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let expected = "\
***** Configuration file for velocity distribution *****

nbins = 600
emax = 100.0
emin = 0.0001
xc/de =  50.00
yc/de =   0.50
zc/de = -12.25
xsize = 24
ysize = 1
zsize = 48
nbins_vdist = 100
vmax =   1.50
vmin =   0.00
tframe = 7
";
        assert_eq!(text, expected);
    }
}
