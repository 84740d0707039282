use anyhow::Result;

pub const DEFAULT_FONT_STEP: f32 = 0.5;
pub const DEFAULT_MIN_FONT_SIZE: f32 = 5.0;
/// Smallest step the search accepts; finer steps are raised to this.
pub const MIN_FONT_STEP: f32 = 0.01;
/// Sizes above this are clamped before the search starts.
pub const MAX_FONT_SIZE: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    pub step: f32,
    pub floor: f32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_FONT_STEP,
            floor: DEFAULT_MIN_FONT_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOutcome {
    pub size: f32,
    /// `false` when no tested size fitted and the floor was returned.
    pub fits: bool,
}

/// Largest size in `initial, initial - step, ...` down to the floor whose
/// measured width is within `max_width`. Returns the floor when none fits.
///
/// An initial size already below the floor is tried as is before falling back
/// to the floor. The search starts at most at [`MAX_FONT_SIZE`] and never
/// measures more than `(MAX_FONT_SIZE - floor) / MIN_FONT_STEP + 1` sizes.
pub fn fit_font_size<F>(max_width: f32, initial: f32, config: FitConfig, mut measure: F) -> Result<FitOutcome>
where
    F: FnMut(f32) -> Result<f32>,
{
    let step = if config.step.is_finite() && config.step > 0.0 {
        config.step.max(MIN_FONT_STEP)
    } else {
        DEFAULT_FONT_STEP
    };
    let initial = initial.min(MAX_FONT_SIZE);
    if initial < config.floor {
        if measure(initial)? <= max_width {
            return Ok(FitOutcome {
                size: initial,
                fits: true,
            });
        }
        return Ok(FitOutcome {
            size: config.floor,
            fits: false,
        });
    }

    let max_steps = ((initial - config.floor) / step).floor() as u64;
    for n in 0..=max_steps {
        let size = initial - step * n as f32;
        if size < config.floor {
            break;
        }
        if measure(size)? <= max_width {
            return Ok(FitOutcome { size, fits: true });
        }
    }
    Ok(FitOutcome {
        size: config.floor,
        fits: false,
    })
}
