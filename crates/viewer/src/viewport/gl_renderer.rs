use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use glow::HasContext;
use morph_viewer_lib::backend::{GeometryId, GpuBackend, MaterialId};
use morph_viewer_lib::error::{ViewerError, ViewerResult};
use morph_viewer_lib::surface::SurfaceMaterial;
use morph_viewer_lib::viewer::FrameOutput;

use super::mesh::{MeshData, STRIDE};

/// Pixel rectangle [x, y, width, height] with a bottom-left origin
pub type PixelViewport = [f32; 4];

// ── GPU mesh handles ─────────────────────────────────────────

struct GpuMesh {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ibo: glow::Buffer,
    index_count: i32,
}

// ── GL renderer ──────────────────────────────────────────────

/// Owns every GL object the viewer creates. Shared between the backend
/// (uploads during `update`) and the paint callback (draws).
pub struct GlRenderer {
    program: Option<glow::Program>,
    meshes: HashMap<GeometryId, GpuMesh>,
    materials: HashMap<MaterialId, SurfaceMaterial>,
    next_id: u64,
    context_released: bool,
}

impl GlRenderer {
    fn new() -> Self {
        Self {
            program: None,
            meshes: HashMap::new(),
            materials: HashMap::new(),
            next_id: 0,
            context_released: false,
        }
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Draw one frame into `viewport`
    pub fn paint(&self, gl: &glow::Context, frame: &FrameOutput, viewport: PixelViewport) {
        let Some(program) = self.program else {
            return;
        };
        let [x, y, w, h] = viewport.map(|v| v as i32);

        unsafe {
            gl.viewport(x, y, w, h);
            gl.scissor(x, y, w, h);
            gl.enable(glow::SCISSOR_TEST);

            let [r, g, b] = frame.background;
            gl.clear_color(r, g, b, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LESS);

            gl.use_program(Some(program));
            set_uniform_mat4(gl, program, "u_mvp", &frame.view_projection);
            set_uniform_vec3(gl, program, "u_camera_pos", &frame.camera_position);
            set_uniform_f32(gl, program, "u_ambient", frame.lights.ambient);
            for (i, light) in frame.lights.points.iter().enumerate() {
                set_uniform_vec3(gl, program, &format!("u_light_pos[{i}]"), &light.position);
                set_uniform_f32(gl, program, &format!("u_light_intensity[{i}]"), light.intensity);
            }

            for item in &frame.draws {
                let (Some(mesh), Some(material)) =
                    (self.meshes.get(&item.geometry), self.materials.get(&item.material))
                else {
                    continue;
                };
                set_uniform_vec3(gl, program, "u_translation", &item.translation);
                set_material(gl, program, material);

                let mode = if material.wireframe { glow::LINE } else { glow::FILL };
                gl.polygon_mode(glow::FRONT_AND_BACK, mode);
                draw_mesh(gl, mesh);
            }

            gl.polygon_mode(glow::FRONT_AND_BACK, glow::FILL);
            gl.disable(glow::DEPTH_TEST);
            gl.disable(glow::SCISSOR_TEST);
            gl.use_program(None);
        }
    }

    fn destroy(&mut self, gl: &glow::Context) {
        unsafe {
            if let Some(program) = self.program.take() {
                gl.delete_program(program);
            }
            for (_, mesh) in self.meshes.drain() {
                delete_mesh(gl, &mesh);
            }
        }
        self.materials.clear();
    }
}

// ── Backend ──────────────────────────────────────────────────

/// `GpuBackend` over eframe's glow context
pub struct GlBackend {
    gl: Option<Arc<glow::Context>>,
    renderer: Arc<Mutex<GlRenderer>>,
}

impl GlBackend {
    pub fn new(gl: Option<Arc<glow::Context>>) -> Self {
        Self {
            gl,
            renderer: Arc::new(Mutex::new(GlRenderer::new())),
        }
    }

    /// Handle for the paint callback
    pub fn renderer(&self) -> Arc<Mutex<GlRenderer>> {
        Arc::clone(&self.renderer)
    }

    fn lock(&self) -> MutexGuard<'_, GlRenderer> {
        self.renderer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn context(&self) -> ViewerResult<&glow::Context> {
        match &self.gl {
            Some(gl) if !self.lock().context_released => Ok(gl.as_ref()),
            Some(_) => Err(ViewerError::invalid_state("GL context already released")),
            None => Err(ViewerError::PlatformUnsupported {
                reason: "no OpenGL context".into(),
            }),
        }
    }
}

impl GpuBackend for GlBackend {
    fn create_surface(&mut self) -> ViewerResult<()> {
        let gl = self.context()?;
        let program = compile_program(gl, MESH_VERT, MESH_FRAG)
            .map_err(|reason| ViewerError::PlatformUnsupported { reason })?;
        self.lock().program = Some(program);
        Ok(())
    }

    fn upload_geometry(&mut self, mesh: &MeshData) -> ViewerResult<GeometryId> {
        let gl = self.context()?;
        let gpu = upload_mesh(gl, mesh).map_err(ViewerError::invalid_state)?;
        let mut r = self.lock();
        let id = GeometryId(r.next());
        r.meshes.insert(id, gpu);
        Ok(id)
    }

    fn create_material(&mut self, material: &SurfaceMaterial) -> ViewerResult<MaterialId> {
        let mut r = self.lock();
        let id = MaterialId(r.next());
        r.materials.insert(id, material.clone());
        Ok(id)
    }

    fn update_material(&mut self, id: MaterialId, material: &SurfaceMaterial) {
        if let Some(slot) = self.lock().materials.get_mut(&id) {
            *slot = material.clone();
        }
    }

    fn release_geometry(&mut self, id: GeometryId) {
        let removed = self.lock().meshes.remove(&id);
        if let (Some(mesh), Some(gl)) = (removed, self.gl.as_deref()) {
            unsafe { delete_mesh(gl, &mesh) };
        }
    }

    fn release_material(&mut self, id: MaterialId) {
        self.lock().materials.remove(&id);
    }

    /// Frees every GL object; later releases only update bookkeeping
    fn release_context(&mut self) {
        let Some(gl) = self.gl.clone() else {
            return;
        };
        let mut r = self.lock();
        r.destroy(&gl);
        r.context_released = true;
    }

    fn detach_surface(&mut self) {
        self.gl = None;
        tracing::debug!("GL surface detached");
    }
}

// ── GPU upload ───────────────────────────────────────────────

fn upload_mesh(gl: &glow::Context, data: &MeshData) -> Result<GpuMesh, String> {
    unsafe {
        let vao = gl.create_vertex_array()?;
        gl.bind_vertex_array(Some(vao));

        let vbo = gl.create_buffer()?;
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, cast_slice(&data.vertices), glow::STATIC_DRAW);

        let stride = (STRIDE * 4) as i32;
        // position: location 0
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
        // normal: location 1
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 3 * 4);
        // color: location 2
        gl.enable_vertex_attrib_array(2);
        gl.vertex_attrib_pointer_f32(2, 3, glow::FLOAT, false, stride, 6 * 4);

        let ibo = gl.create_buffer()?;
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
        gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, cast_slice(&data.indices), glow::STATIC_DRAW);

        gl.bind_vertex_array(None);

        Ok(GpuMesh {
            vao,
            vbo,
            ibo,
            index_count: data.indices.len() as i32,
        })
    }
}

unsafe fn delete_mesh(gl: &glow::Context, mesh: &GpuMesh) {
    gl.delete_vertex_array(mesh.vao);
    gl.delete_buffer(mesh.vbo);
    gl.delete_buffer(mesh.ibo);
}

unsafe fn draw_mesh(gl: &glow::Context, mesh: &GpuMesh) {
    gl.bind_vertex_array(Some(mesh.vao));
    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(mesh.ibo));
    gl.draw_elements(glow::TRIANGLES, mesh.index_count, glow::UNSIGNED_INT, 0);
    gl.bind_vertex_array(None);
}

// ── Shader compilation ───────────────────────────────────────

fn compile_program(gl: &glow::Context, vert_src: &str, frag_src: &str) -> Result<glow::Program, String> {
    unsafe {
        let program = gl.create_program()?;
        let mut shaders = Vec::with_capacity(2);

        for (kind, src) in [(glow::VERTEX_SHADER, vert_src), (glow::FRAGMENT_SHADER, frag_src)] {
            let shader = gl.create_shader(kind)?;
            gl.shader_source(shader, src);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                tracing::error!("Shader compile error: {log}");
                gl.delete_shader(shader);
                gl.delete_program(program);
                return Err(log);
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        gl.link_program(program);
        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }
        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            tracing::error!("Program link error: {log}");
            gl.delete_program(program);
            return Err(log);
        }

        Ok(program)
    }
}

// ── Uniform setters ──────────────────────────────────────────

unsafe fn set_material(gl: &glow::Context, program: glow::Program, m: &SurfaceMaterial) {
    let base = glam::Vec3::from_array(m.base_color);
    set_uniform_vec3(gl, program, "u_base_color", &base);
    set_uniform_f32(gl, program, "u_use_vertex_color", if m.use_vertex_color { 1.0 } else { 0.0 });
    set_uniform_f32(gl, program, "u_metalness", m.metalness);
    set_uniform_f32(gl, program, "u_roughness", m.roughness);
    set_uniform_f32(gl, program, "u_clearcoat", m.clearcoat);
    set_uniform_f32(gl, program, "u_clearcoat_roughness", m.clearcoat_roughness);
}

fn set_uniform_mat4(gl: &glow::Context, program: glow::Program, name: &str, mat: &glam::Mat4) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &mat.to_cols_array());
    }
}

fn set_uniform_vec3(gl: &glow::Context, program: glow::Program, name: &str, v: &glam::Vec3) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_3_f32(loc.as_ref(), v.x, v.y, v.z);
    }
}

fn set_uniform_f32(gl: &glow::Context, program: glow::Program, name: &str, v: f32) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_1_f32(loc.as_ref(), v);
    }
}

// ── Byte cast helper ─────────────────────────────────────────

fn cast_slice<T: Copy>(slice: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}

// ── Shaders ──────────────────────────────────────────────────

const MESH_VERT: &str = r#"#version 330 core
uniform mat4 u_mvp;
uniform vec3 u_translation;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec3 a_color;

out vec3 v_world;
out vec3 v_normal;
out vec3 v_color;

void main() {
    vec3 world = a_position + u_translation;
    gl_Position = u_mvp * vec4(world, 1.0);
    v_world = world;
    v_normal = a_normal;
    v_color = a_color;
}
"#;

const MESH_FRAG: &str = r#"#version 330 core
uniform vec3 u_camera_pos;
uniform float u_ambient;
uniform vec3 u_light_pos[4];
uniform float u_light_intensity[4];

uniform vec3 u_base_color;
uniform float u_use_vertex_color;
uniform float u_metalness;
uniform float u_roughness;
uniform float u_clearcoat;
uniform float u_clearcoat_roughness;

in vec3 v_world;
in vec3 v_normal;
in vec3 v_color;

out vec4 frag_color;

const float AMBIENT_WEIGHT = 0.45;

float specular(vec3 n, vec3 l, vec3 v, float roughness) {
    vec3 h = normalize(l + v);
    float shininess = mix(256.0, 4.0, clamp(roughness, 0.0, 1.0));
    return pow(max(dot(n, h), 0.0), shininess);
}

void main() {
    vec3 albedo = mix(u_base_color, v_color, u_use_vertex_color);
    vec3 n = normalize(v_normal);
    vec3 v = normalize(u_camera_pos - v_world);
    if (dot(n, v) < 0.0) {
        n = -n;
    }

    vec3 diffuse_color = albedo * (1.0 - u_metalness);
    vec3 spec_color = mix(vec3(0.04), albedo, u_metalness);

    vec3 color = diffuse_color * u_ambient * AMBIENT_WEIGHT;
    for (int i = 0; i < 4; i++) {
        vec3 l = normalize(u_light_pos[i] - v_world);
        float ndl = max(dot(n, l), 0.0);
        float s = specular(n, l, v, u_roughness);
        float coat = u_clearcoat * specular(n, l, v, u_clearcoat_roughness);
        color += u_light_intensity[i] * (diffuse_color * ndl * 2.0 + spec_color * s + vec3(coat * 0.25));
    }

    frag_color = vec4(clamp(color, 0.0, 1.0), 1.0);
}
"#;
