//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Telnet protocol constants and utilities
//!
//! This module defines telnet commands and options, the option negotiation
//! sent to every new telnet client, and a streaming decoder that separates
//! telnet commands from the user's keystrokes.

/// Telnet command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetCommand {
    /// Interpret As Command
    IAC = 255,
    /// Don't do option
    DONT = 254,
    /// Do option
    DO = 253,
    /// Won't do option
    WONT = 252,
    /// Will do option
    WILL = 251,
    /// Subnegotiation begin
    SB = 250,
    /// Go ahead
    GA = 249,
    /// Erase line
    EL = 248,
    /// Erase character
    EC = 247,
    /// Are you there
    AYT = 246,
    /// Abort output
    AO = 245,
    /// Interrupt process
    IP = 244,
    /// Break
    BRK = 243,
    /// Data mark
    DM = 242,
    /// No operation
    NOP = 241,
    /// Subnegotiation end
    SE = 240,
}

impl TelnetCommand {
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Telnet option codes used by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetOption {
    /// Echo
    Echo = 1,
    /// Suppress go ahead
    SuppressGoAhead = 3,
    /// Terminal type
    TerminalType = 24,
    /// Negotiate about window size (NAWS)
    NAWS = 31,
    /// Linemode
    Linemode = 34,
    /// Charset (RFC 2066)
    Charset = 42,
    /// GMCP (Generic MUD Communication Protocol)
    GMCP = 201,
}

impl TelnetOption {
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Build a telnet negotiation sequence
pub fn build_negotiation(command: TelnetCommand, option: TelnetOption) -> Vec<u8> {
    vec![
        TelnetCommand::IAC.to_byte(),
        command.to_byte(),
        option.to_byte(),
    ]
}

/// Negotiation sent once when a telnet client connects, in send order.
///
/// Character-at-a-time input (suppress go-ahead on, linemode off), server
/// side echo, window size reports, charset renegotiation and GMCP.
pub fn negotiation_sequence() -> Vec<Vec<u8>> {
    vec![
        build_negotiation(TelnetCommand::WILL, TelnetOption::SuppressGoAhead),
        build_negotiation(TelnetCommand::WONT, TelnetOption::Linemode),
        build_negotiation(TelnetCommand::WILL, TelnetOption::Echo),
        build_negotiation(TelnetCommand::DO, TelnetOption::NAWS),
        build_negotiation(TelnetCommand::DO, TelnetOption::Charset),
        build_negotiation(TelnetCommand::WILL, TelnetOption::GMCP),
    ]
}

/// Parse window size from NAWS subnegotiation data
pub fn parse_window_size(data: &[u8]) -> Option<(u16, u16)> {
    if data.len() >= 4 {
        let width = u16::from_be_bytes([data[0], data[1]]);
        let height = u16::from_be_bytes([data[2], data[3]]);
        Some((width, height))
    } else {
        None
    }
}

/// Something the decoder found in the stream besides plain data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    Negotiation { command: u8, option: u8 },
    Subnegotiation { option: u8, data: Vec<u8> },
    Command(u8),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DecodeState {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    SubOption,
    SubData,
    SubIac,
}

/// Streaming IAC decoder. State carries across reads, so a sequence split
/// over two packets is still recognised.
#[derive(Debug, Default)]
pub struct TelnetDecoder {
    state: DecodeState,
    sub_option: u8,
    sub_data: Vec<u8>,
}

impl TelnetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `input` into user data and telnet events
    pub fn decode(&mut self, input: &[u8]) -> (Vec<u8>, Vec<TelnetEvent>) {
        const IAC: u8 = TelnetCommand::IAC as u8;
        const SB: u8 = TelnetCommand::SB as u8;
        const SE: u8 = TelnetCommand::SE as u8;

        let mut data = Vec::with_capacity(input.len());
        let mut events = Vec::new();

        for &byte in input {
            self.state = match self.state {
                DecodeState::Data => {
                    if byte == IAC {
                        DecodeState::Iac
                    } else {
                        data.push(byte);
                        DecodeState::Data
                    }
                }
                DecodeState::Iac => match byte {
                    IAC => {
                        data.push(IAC);
                        DecodeState::Data
                    }
                    251..=254 => DecodeState::Negotiate(byte),
                    SB => DecodeState::SubOption,
                    _ => {
                        events.push(TelnetEvent::Command(byte));
                        DecodeState::Data
                    }
                },
                DecodeState::Negotiate(command) => {
                    events.push(TelnetEvent::Negotiation {
                        command,
                        option: byte,
                    });
                    DecodeState::Data
                }
                DecodeState::SubOption => {
                    self.sub_option = byte;
                    self.sub_data.clear();
                    DecodeState::SubData
                }
                DecodeState::SubData => {
                    if byte == IAC {
                        DecodeState::SubIac
                    } else {
                        self.sub_data.push(byte);
                        DecodeState::SubData
                    }
                }
                DecodeState::SubIac => match byte {
                    SE => {
                        events.push(TelnetEvent::Subnegotiation {
                            option: self.sub_option,
                            data: std::mem::take(&mut self.sub_data),
                        });
                        DecodeState::Data
                    }
                    IAC => {
                        self.sub_data.push(IAC);
                        DecodeState::SubData
                    }
                    // Malformed; drop the partial subnegotiation
                    _ => {
                        self.sub_data.clear();
                        DecodeState::Data
                    }
                },
            };
        }

        (data, events)
    }
}
