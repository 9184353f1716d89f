// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod clients;
pub mod assets;
pub mod activities;
pub mod reports;
pub mod notifications;
pub mod devices;
pub mod settings;
pub mod doctor;
