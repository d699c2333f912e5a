//! Value Change Dump (VCD) output.
//!
//! [`VcdWriter`] serializes a waveform section by section: header metadata,
//! scoped `$var` declarations, `$enddefinitions`, then timestamped change
//! records. Sections must come in that order; writing one out of order is a
//! [`SimError::WaveformOrder`]. [`VcdTracer`] drives a writer from a
//! simulation run as a [`SignalObserver`].
//!
//! Variable identifiers are drawn from the 94 printable ASCII characters
//! `!`..`~` in bijective base 94, so id 0 is `!`, id 93 is `~` and id 94
//! is `!!`.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use pulse_common::{SimTime, Value};
use pulse_config::WaveformSettings;

use crate::error::SimError;
use crate::graph::{Netlist, Signal};
use crate::ids::SignalId;
use crate::observer::SignalObserver;

const ID_FIRST: u8 = b'!';
const ID_BASE: u64 = 94;

/// Returns the identifier for the `n`-th registered variable.
pub fn id_to_str(n: u64) -> String {
    let mut rest = n + 1;
    let mut out = Vec::new();
    while rest > 0 {
        rest -= 1;
        out.push(ID_FIRST + (rest % ID_BASE) as u8);
        rest /= ID_BASE;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// What the writer knows about a registered signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcdVarInfo {
    /// The allocated identifier.
    pub id: String,
    /// Signal name as written in the `$var` line.
    pub name: String,
    /// Declared width in bits.
    pub width: u32,
    /// Single-bit signals use the `<value><id>` record form.
    pub scalar: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Start,
    Date,
    Version,
    Timescale,
    Definitions,
    Dumping,
}

/// Streaming VCD serializer.
pub struct VcdWriter<W: Write> {
    out: W,
    vars: HashMap<SignalId, VcdVarInfo>,
    next_id: u64,
    stage: Stage,
    depth: u32,
    last_time: Option<u64>,
    /// Write error raised while closing a scope on drop.
    deferred: Option<io::Error>,
}

impl<W: Write> VcdWriter<W> {
    /// Creates a writer over `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            vars: HashMap::new(),
            next_id: 0,
            stage: Stage::Start,
            depth: 0,
            last_time: None,
            deferred: None,
        }
    }

    /// Writes the `$date` section.
    pub fn date(&mut self, text: &str) -> Result<(), SimError> {
        self.enter_header("date", Stage::Date)?;
        write!(self.out, "$date\n   {text}\n$end\n")?;
        Ok(())
    }

    /// Writes the `$version` section.
    pub fn version(&mut self, text: &str) -> Result<(), SimError> {
        self.enter_header("version", Stage::Version)?;
        write!(self.out, "$version   \n{text}\n$end\n")?;
        Ok(())
    }

    /// Writes the `$timescale` section, in picoseconds.
    pub fn timescale(&mut self, ps: u64) -> Result<(), SimError> {
        self.enter_header("timescale", Stage::Timescale)?;
        writeln!(self.out, "$timescale {ps}ps $end")?;
        Ok(())
    }

    /// Opens a named scope. The scope is closed when the returned guard is
    /// closed or dropped.
    pub fn module(&mut self, name: &str) -> Result<VcdModule<'_, W>, SimError> {
        self.open_scope(name)?;
        Ok(VcdModule {
            writer: self,
            closed: false,
        })
    }

    /// Opens a scope, runs `f` inside it and closes it on every exit path.
    ///
    /// An error from `f` takes precedence over an error closing the scope.
    pub fn with_module<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut VcdModule<'_, W>) -> Result<T, SimError>,
    ) -> Result<T, SimError> {
        let mut module = self.module(name)?;
        let result = f(&mut module);
        let closed = module.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Ends the definitions section. Change records may follow.
    pub fn enddefinitions(&mut self) -> Result<(), SimError> {
        self.take_deferred()?;
        if self.stage > Stage::Definitions {
            return Err(order_error("enddefinitions", "definitions already ended"));
        }
        if self.depth > 0 {
            return Err(order_error("enddefinitions", "a scope is still open"));
        }
        writeln!(self.out, "$enddefinitions $end")?;
        self.stage = Stage::Dumping;
        Ok(())
    }

    /// Writes a value change of a registered signal at `time` (in timescale
    /// units).
    ///
    /// A `#<time>` marker is written only when time advances past the last
    /// written one. Going back in time is an error.
    pub fn change(&mut self, time: u64, id: SignalId, value: &Value) -> Result<(), SimError> {
        self.take_deferred()?;
        if self.stage != Stage::Dumping {
            return Err(order_error("change", "definitions not ended yet"));
        }
        let info = self.vars.get(&id).ok_or_else(|| SimError::UnknownVar {
            signal: format!("#{}", id.as_raw()),
        })?;
        if value.width() != info.width {
            return Err(SimError::WidthMismatch {
                signal: info.name.clone(),
                expected: info.width,
                actual: value.width(),
            });
        }
        match self.last_time {
            Some(last) if time < last => {
                return Err(SimError::TimeRewind {
                    last,
                    requested: time,
                })
            }
            Some(last) if time == last => {}
            _ => {
                writeln!(self.out, "#{time}")?;
                self.last_time = Some(time);
            }
        }
        if info.scalar {
            writeln!(self.out, "{}{}", vcd_char(value, 0), info.id)?;
        } else {
            let bits: String = (0..info.width).rev().map(|i| vcd_char(value, i)).collect();
            writeln!(self.out, "b{bits} {}", info.id)?;
        }
        Ok(())
    }

    /// Returns what was declared for a registered signal.
    pub fn var_info(&self, id: SignalId) -> Option<&VcdVarInfo> {
        self.vars.get(&id)
    }

    /// Returns `true` if the signal has a `$var` declaration.
    pub fn is_registered(&self, id: SignalId) -> bool {
        self.vars.contains_key(&id)
    }

    /// The underlying output.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Flushes the output.
    pub fn flush(&mut self) -> Result<(), SimError> {
        self.take_deferred()?;
        self.out.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying output.
    pub fn into_inner(mut self) -> Result<W, SimError> {
        self.flush()?;
        Ok(self.out)
    }

    fn enter_header(&mut self, section: &'static str, stage: Stage) -> Result<(), SimError> {
        self.take_deferred()?;
        if self.stage >= stage {
            return Err(order_error(
                section,
                "header sections go date, version, timescale, once each, before any scope",
            ));
        }
        self.stage = stage;
        Ok(())
    }

    fn open_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.take_deferred()?;
        if self.stage > Stage::Definitions {
            return Err(order_error("scope", "definitions already ended"));
        }
        writeln!(self.out, "$scope module {name} $end")?;
        self.stage = Stage::Definitions;
        self.depth += 1;
        Ok(())
    }

    fn close_scope(&mut self) -> io::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        writeln!(self.out, "$upscope $end")
    }

    fn declare(&mut self, id: SignalId, signal: &Signal) -> Result<&VcdVarInfo, SimError> {
        self.take_deferred()?;
        if self.vars.contains_key(&id) {
            return Err(SimError::DuplicateVar {
                signal: signal.name().to_string(),
            });
        }
        let info = VcdVarInfo {
            id: id_to_str(self.next_id),
            name: signal.name().to_string(),
            width: signal.width(),
            scalar: signal.ty().is_scalar(),
        };
        writeln!(
            self.out,
            "$var wire {} {} {} $end",
            info.width,
            info.id,
            info.name
        )?;
        self.next_id += 1;
        Ok(self.vars.entry(id).or_insert(info))
    }

    fn take_deferred(&mut self) -> Result<(), SimError> {
        match self.deferred.take() {
            Some(e) => Err(SimError::WaveformIo(e)),
            None => Ok(()),
        }
    }
}

/// An open `$scope`; writes `$upscope` when closed or dropped.
pub struct VcdModule<'w, W: Write> {
    writer: &'w mut VcdWriter<W>,
    closed: bool,
}

impl<W: Write> VcdModule<'_, W> {
    /// Declares `signal` in this scope and allocates its identifier.
    pub fn var(&mut self, id: SignalId, signal: &Signal) -> Result<&VcdVarInfo, SimError> {
        self.writer.declare(id, signal)
    }

    /// Opens a nested scope.
    pub fn module(&mut self, name: &str) -> Result<VcdModule<'_, W>, SimError> {
        self.writer.module(name)
    }

    /// Closes the scope, reporting any write error.
    pub fn close(mut self) -> Result<(), SimError> {
        self.closed = true;
        self.writer.close_scope()?;
        Ok(())
    }
}

impl<W: Write> Drop for VcdModule<'_, W> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.writer.close_scope() {
            self.writer.deferred.get_or_insert(e);
        }
    }
}

fn vcd_char(value: &Value, index: u32) -> char {
    value.bit(index).to_vcd_char()
}

fn order_error(section: &'static str, reason: &str) -> SimError {
    SimError::WaveformOrder {
        section,
        reason: reason.to_string(),
    }
}

/// Writes a simulation run as VCD.
///
/// On `before_sim` it writes the header and declares every registered signal
/// in one module scope, in registration order. Each later update of a traced
/// signal becomes a change record at `time / timescale`.
pub struct VcdTracer<W: Write> {
    writer: VcdWriter<W>,
    module: String,
    timescale: SimTime,
    date: Option<String>,
    version: Option<String>,
}

impl<W: Write> VcdTracer<W> {
    /// Creates a tracer with module `top` and a 1 ps timescale.
    pub fn new(out: W) -> Self {
        Self {
            writer: VcdWriter::new(out),
            module: "top".to_string(),
            timescale: SimTime::from_ps(1),
            date: None,
            version: None,
        }
    }

    /// Creates a tracer configured from `[waveform]` settings.
    pub fn from_settings(out: W, settings: &WaveformSettings) -> Self {
        Self {
            writer: VcdWriter::new(out),
            module: settings.module.clone(),
            timescale: settings.timescale,
            date: settings.date.clone(),
            version: settings.version.clone(),
        }
    }

    /// Sets the scope name.
    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.module = name.into();
        self
    }

    /// Sets the time unit of change records.
    pub fn with_timescale(mut self, timescale: SimTime) -> Self {
        self.timescale = timescale;
        self
    }

    /// Sets the `$date` text instead of the current local time.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Sets the `$version` text.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// The underlying writer.
    pub fn writer(&self) -> &VcdWriter<W> {
        &self.writer
    }

    /// Flushes and returns the underlying output.
    pub fn into_inner(self) -> Result<W, SimError> {
        self.writer.into_inner()
    }
}

impl<W: Write> SignalObserver for VcdTracer<W> {
    fn before_sim(&mut self, netlist: &Netlist, registered: &[SignalId]) -> Result<(), SimError> {
        let date = match &self.date {
            Some(d) => d.clone(),
            None => chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let version = match &self.version {
            Some(v) => v.clone(),
            None => format!("pulse {}", env!("CARGO_PKG_VERSION")),
        };
        self.writer.date(&date)?;
        self.writer.version(&version)?;
        self.writer.timescale(self.timescale.as_ps())?;
        self.writer.with_module(&self.module, |m| {
            for &id in registered {
                m.var(id, netlist.signal(id))?;
            }
            Ok(())
        })?;
        self.writer.enddefinitions()
    }

    fn on_change(&mut self, time: SimTime, id: SignalId, signal: &Signal) -> Result<(), SimError> {
        if !self.writer.is_registered(id) {
            return Ok(());
        }
        let units = time.as_ps() / self.timescale.as_ps().max(1);
        self.writer.change(units, id, signal.value())
    }

    fn after_sim(&mut self, _time: SimTime) -> Result<(), SimError> {
        self.writer.flush()
    }
}

/// Creates a buffered file tracer from `[waveform]` settings.
///
/// Returns `None` when waveform output is disabled or no path is set.
/// Missing parent directories are created.
pub fn open_waveform(
    settings: &WaveformSettings,
) -> Result<Option<VcdTracer<BufWriter<File>>>, SimError> {
    if !settings.enabled {
        return Ok(None);
    }
    let Some(path) = settings.path.as_deref() else {
        return Ok(None);
    };
    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    Ok(Some(VcdTracer::from_settings(BufWriter::new(file), settings)))
}
