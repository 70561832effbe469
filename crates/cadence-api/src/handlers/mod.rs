// SPDX-License-Identifier: GPL-3.0-or-later
pub mod analysis;
pub mod jobs;
pub mod queue;
pub mod worker;
