use crate::models::analysis::DefectType;

/// Density bands, checked highest first: (lower bound, inclusive?, defect, severity multiplier).
///
/// The crack band includes its lower bound; the others require density strictly above it.
const DENSITY_BANDS: &[(f64, bool, DefectType, f64)] = &[
    (0.15, true, DefectType::Crack, 300.0),
    (0.10, false, DefectType::RoughSurface, 250.0),
    (0.05, false, DefectType::EdgeCrack, 200.0),
];

/// Maps an edge density in [0, 1] to a defect type and a 0–100 severity.
pub fn classify_density(density: f64) -> (DefectType, f64) {
    let density = if density.is_finite() {
        density.clamp(0.0, 1.0)
    } else {
        0.0
    };

    for &(bound, inclusive, defect, multiplier) in DENSITY_BANDS {
        let in_band = if inclusive {
            density >= bound
        } else {
            density > bound
        };
        if in_band {
            return (defect, (density * multiplier).min(100.0));
        }
    }

    (DefectType::NoDefect, density * 100.0)
}
