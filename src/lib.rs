/*!
# Calibration Report

Calibration reports for industrial field instruments: transmitters, pressure
switches and thermostats.

## Overview

An instrumentist fills one table row per test point. For transmitters each row
holds the ideal and measured output signal (mA, mV or Ω) and, when the
transmitter has a local display, its reading in engineering units. The
measurement error engine derives the error columns of every row; the rest of
the crate turns the tables into reports.

## Architecture

### Engine
- **measurement**: `MeasurementRecord`, `SignalDomain`, `InstrumentConfiguration`
  and lenient parsing of operator text
- **engine**: span lookup, per-row recomputation, row management and display
  rounding
- **switch_test**: switch test points, conformance tally, differential
  statistics and hysteresis branches

### Collaborators
- **session**: edited form state and its persistence (`SessionStore`, gzip +
  bincode files)
- **report**: report header, summary, CSV and XLSX export
- **graph**: response, error and switching-point charts as PNG
- **loader**: measurement rows from CSV files
- **login**: user store, Argon2 password hashes, bearer tokens
- **config**: layered settings (defaults, `calreport.toml`, `CALREPORT_*`)
- **app**: JSON HTTP API (feature `web`)

## Error model

The engine never fails: empty or malformed readings count as zero and the
percentage error is relative to the span of the signal domain
(16 mA, 100 mV, 16 Ω). Collaborators report failures through the enums in
[`error`].

## REST API Endpoints

- `POST /api/auth/login`, `POST /api/auth/logout`
- `POST /api/measurements/{recompute,append,remove}`
- `POST /api/switch-tests/summary`
- `POST /api/reports/{summary,csv,xlsx}`
- `POST /api/charts/transmitter?kind=response|error`, `POST /api/charts/switch`
- `GET|PUT|DELETE /api/sessions/{name}`
*/

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod loader;
pub mod login;
pub mod measurement;
pub mod report;
pub mod session;

#[cfg(feature = "web")]
pub mod app;

pub use engine::{append_blank_record, recompute, remove_record, span_for};
pub use measurement::{InstrumentConfiguration, MeasurementRecord, SignalDomain};
