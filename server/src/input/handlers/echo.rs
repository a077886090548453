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


use crate::input::{ClientInput, ConnectionState, HandlerError, InputHandler};
use async_trait::async_trait;

/// Echoes accepted keystrokes, erasures and newlines back to stream clients
pub struct EchoHandler;

#[async_trait]
impl InputHandler for EchoHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        state.echo(&input.data_in, input.erased, input.enter_pressed)?;
        Ok(true)
    }
}
